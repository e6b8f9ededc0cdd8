//! Fabric SDK - client side of an endorse, order and commit ledger network
//!
//! Pipeline:
//! - Build and sign a proposal for one request kind
//! - Fan it out to every endorsing peer and collect the responses
//! - Assemble agreeing endorsements into a signed transaction
//! - Broadcast it to the ordering service
//! - Optionally wait until every committing peer reports it valid
//!
//! Channel membership changes go through the config update workflow in
//! [`config_update`], where several organizations sign the same delta.

pub mod assembler;
pub mod block;
pub mod broadcast;
pub mod channel;
pub mod config;
pub mod config_update;
pub mod contract;
pub mod deliver;
pub mod endorser;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod organization;
pub mod proposal;
pub mod signer;
pub mod transaction;
pub mod transport;

pub use broadcast::{BroadcastStream, OrdererClient};
pub use config::{NodeConfig, SdkConfig, Timeouts};
pub use contract::Contract;
pub use deliver::{DeliverClient, DeliverGroup, DeliverStream};
pub use endorser::Endorser;
pub use error::{Result, SdkError};
pub use gateway::{Gateway, GatewayResponse};
pub use proposal::{ChaincodeDefinition, Invocation, ProposalBuilder, ProposalKind};
pub use signer::{Ed25519Signer, Signer};
pub use transaction::{Endpoints, TxResponse};

#[cfg(test)]
mod tests;
