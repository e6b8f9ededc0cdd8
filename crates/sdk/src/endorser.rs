//! Endorsement fan-out
//!
//! A signed proposal is sent to every endorsing peer at once. Each peer call
//! runs on its own task and hands its outcome to a success or error channel
//! sized to the peer count. Once every task has finished the error channel is
//! drained first: a single unreachable peer fails the whole collection.

use crate::error::{Result, SdkError};
use async_trait::async_trait;
use fabric_protos::{ProposalResponse, SignedProposal};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Handle to an endorsing peer
#[async_trait]
pub trait Endorser: Send + Sync {
    /// Address used in logs and errors
    fn address(&self) -> &str;

    /// Simulate a proposal and return the peer's signed opinion
    async fn process_proposal(&self, proposal: &SignedProposal) -> Result<ProposalResponse>;
}

/// Send one signed proposal to every endorser concurrently
///
/// Responses come back in completion order. Any transport failure fails the
/// call even if every other peer answered.
pub async fn collect_endorsements(
    proposal: &SignedProposal,
    endorsers: &[Arc<dyn Endorser>],
    timeout: Duration,
) -> Result<Vec<ProposalResponse>> {
    if endorsers.is_empty() {
        return Ok(Vec::new());
    }

    let proposal = Arc::new(proposal.clone());
    let (response_tx, mut response_rx) = mpsc::channel(endorsers.len());
    let (error_tx, mut error_rx) = mpsc::channel(endorsers.len());

    let mut tasks = JoinSet::new();
    for endorser in endorsers {
        let endorser = endorser.clone();
        let proposal = proposal.clone();
        let response_tx = response_tx.clone();
        let error_tx = error_tx.clone();

        tasks.spawn(async move {
            match endorser.process_proposal(&proposal).await {
                Ok(response) => {
                    let _ = response_tx.send(response).await;
                }
                Err(e) => {
                    tracing::warn!("Endorser {} failed: {}", endorser.address(), e);
                    let _ = error_tx.send(e).await;
                }
            }
        });
    }
    drop(response_tx);
    drop(error_tx);

    tracing::debug!("Proposal sent to {} endorsers", endorsers.len());

    // Dropping the set on timeout aborts the outstanding calls
    let barrier = async {
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                return Err(SdkError::transport("endorser task", e));
            }
        }
        Ok(())
    };
    match tokio::time::timeout(timeout, barrier).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(SdkError::Timeout {
                operation: "endorsement",
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    if let Some(e) = error_rx.recv().await {
        return Err(e);
    }

    let mut responses = Vec::with_capacity(endorsers.len());
    while let Some(response) = response_rx.recv().await {
        responses.push(response);
    }
    Ok(responses)
}

/// Send a signed proposal to a single peer under a deadline
pub async fn endorse_one(proposal: &SignedProposal, endorser: &dyn Endorser, timeout: Duration) -> Result<ProposalResponse> {
    tokio::time::timeout(timeout, endorser.process_proposal(proposal))
        .await
        .map_err(|_| SdkError::Timeout {
            operation: "endorsement",
            timeout_ms: timeout.as_millis() as u64,
        })?
}
