//! Network transport for node handles
//!
//! Every session is a WebSocket connection carrying Borsh encoded [`Frame`]s
//! in binary messages. The first frame names the service the client wants.

pub mod ws;

pub use ws::{WsDeliverClient, WsEndorser, WsOrderer};

use borsh::{BorshDeserialize, BorshSerialize};
use fabric_protos::{BroadcastResponse, CodecError, DeliverResponse, Envelope, ProposalResponse, SignedProposal};

/// Service requested when a session opens
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Service {
    Endorser,
    Broadcast,
    Deliver,
    DeliverFiltered,
}

/// Message exchanged between client and node
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Frame {
    Open(Service),
    Proposal(SignedProposal),
    ProposalResponse(ProposalResponse),
    /// Broadcast submission or deliver seek request
    Envelope(Envelope),
    Broadcast(BroadcastResponse),
    Deliver(DeliverResponse),
    /// Node side failure; ends the session
    Error(String),
}

impl Frame {
    pub fn to_bytes(&self) -> Vec<u8> {
        fabric_protos::encode(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        fabric_protos::decode(data)
    }

    fn name(&self) -> &'static str {
        match self {
            Frame::Open(_) => "open",
            Frame::Proposal(_) => "proposal",
            Frame::ProposalResponse(_) => "proposal response",
            Frame::Envelope(_) => "envelope",
            Frame::Broadcast(_) => "broadcast response",
            Frame::Deliver(_) => "deliver response",
            Frame::Error(_) => "error",
        }
    }
}
