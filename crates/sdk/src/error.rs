//! SDK error types

use fabric_protos::{CodecError, Status, TxValidationCode};
use thiserror::Error;

/// Phase of a commit confirmation that ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverPhase {
    Connect,
    Wait,
}

impl std::fmt::Display for DeliverPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliverPhase::Connect => write!(f, "connect"),
            DeliverPhase::Wait => write!(f, "wait"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no proposal responses received")]
    NoResponses,

    #[error("transport error with {address}: {reason}")]
    Transport { address: String, reason: String },

    #[error("bad proposal response {status}: {message}")]
    EndorsementFailed { status: i32, message: String },

    #[error("proposal response payloads do not match")]
    EndorsementMismatch,

    #[error("signer must be the same as the one referenced in the header")]
    CreatorMismatch,

    #[error("broadcast rejected with status {status}: {info}")]
    BroadcastRejected { status: Status, info: String },

    #[error("transaction {tx_id} invalidated with status ({code}) on {address}")]
    TxInvalidated {
        tx_id: String,
        address: String,
        code: TxValidationCode,
    },

    #[error("deliver completed with status ({status}) before txid {tx_id} received from {address}")]
    DeliverCompleted {
        tx_id: String,
        address: String,
        status: Status,
    },

    #[error("unexpected deliver response from {address}: {detail}")]
    UnexpectedDeliverResponse { address: String, detail: String },

    #[error("timed out during deliver {phase} for txid {tx_id} after {timeout_ms}ms")]
    DeliverTimeout {
        phase: DeliverPhase,
        tx_id: String,
        timeout_ms: u64,
    },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("organization {0} already exists")]
    OrganizationExists(String),

    #[error("organization {0} not found")]
    OrganizationNotFound(String),

    #[error("consortium {0} not found")]
    ConsortiumNotFound(String),

    #[error("organization {0} has already signed")]
    AlreadySigned(String),

    #[error("signature from {creator} was made over a different proposal")]
    SignatureMismatch { creator: String },

    #[error("proposal must be submitted by its sponsor {sponsor}, got {submitter}")]
    ProposerMismatch { sponsor: String, submitter: String },

    #[error("config delta: {0}")]
    ConfigDelta(String),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("signing error: {0}")]
    Signing(String),
}

impl SdkError {
    pub fn transport(address: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        SdkError::Transport {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// True for deadline expiries of any phase
    pub fn is_timeout(&self) -> bool {
        matches!(self, SdkError::DeliverTimeout { .. } | SdkError::Timeout { .. })
    }

    /// True when the transaction may have been ordered but its commit was not confirmed
    pub fn is_commit_failure(&self) -> bool {
        matches!(
            self,
            SdkError::TxInvalidated { .. }
                | SdkError::DeliverCompleted { .. }
                | SdkError::UnexpectedDeliverResponse { .. }
                | SdkError::DeliverTimeout { .. }
        )
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(e: serde_json::Error) -> Self {
        SdkError::Codec(CodecError::Json(e))
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
