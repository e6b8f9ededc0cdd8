//! Ordering service messages

use crate::common::Status;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum SeekPosition {
    Newest,
    Oldest,
    Specified(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum SeekBehavior {
    BlockUntilReady,
    FailIfNotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum SeekErrorResponse {
    Strict,
    BestEffort,
}

/// Range of blocks requested from a deliver service
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SeekInfo {
    pub start: SeekPosition,
    pub stop: SeekPosition,
    pub behavior: SeekBehavior,
    pub error_response: SeekErrorResponse,
}

impl SeekInfo {
    /// Seek a single block
    pub fn single(position: SeekPosition, best_effort: bool) -> Self {
        Self {
            start: position,
            stop: position,
            behavior: SeekBehavior::BlockUntilReady,
            error_response: if best_effort {
                SeekErrorResponse::BestEffort
            } else {
                SeekErrorResponse::Strict
            },
        }
    }

    /// Follow the chain from the newest block onward
    pub fn newest_onward() -> Self {
        Self {
            start: SeekPosition::Newest,
            stop: SeekPosition::Specified(u64::MAX),
            behavior: SeekBehavior::BlockUntilReady,
            error_response: SeekErrorResponse::Strict,
        }
    }
}

/// Acknowledgment for a broadcast envelope
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub status: Status,
    pub info: String,
}
