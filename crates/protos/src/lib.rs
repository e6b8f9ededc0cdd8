//! Shared wire types for the endorse-order-commit protocol
//!
//! This crate contains the message shapes exchanged between the client SDK,
//! endorsing peers and the ordering service:
//! - Headers, proposals, proposal responses and transaction envelopes
//! - Blocks, filtered blocks and deliver seek requests
//! - Channel configuration and configuration updates
//! - Chaincode lifecycle arguments and results
//!
//! Everything travels as Borsh; serde is derived for JSON inputs and debugging.

pub mod codec;
pub mod common;
pub mod config;
pub mod lifecycle;
pub mod orderer;
pub mod peer;

pub use codec::{decode, encode, CodecError};
pub use common::*;
pub use orderer::{BroadcastResponse, SeekBehavior, SeekErrorResponse, SeekInfo, SeekPosition};
pub use peer::*;

/// Status code of a successful endorsement or query
pub const STATUS_OK: i32 = 200;

/// First status code treated as an error by endorsers
pub const STATUS_ERROR_THRESHOLD: i32 = 400;

/// Generic failure status
pub const STATUS_INTERNAL_ERROR: i32 = 500;

/// Partial success (used by aggregated install results)
pub const STATUS_PARTIAL: i32 = 204;
