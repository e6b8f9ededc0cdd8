//! Ordering service submission

use crate::deliver::DeliverStream;
use crate::error::{Result, SdkError};
use async_trait::async_trait;
use fabric_protos::{BroadcastResponse, Envelope, Status};
use std::time::Duration;

/// One broadcast session with the ordering service
#[async_trait]
pub trait BroadcastStream: Send {
    async fn send(&mut self, envelope: &Envelope) -> Result<()>;

    async fn recv(&mut self) -> Result<BroadcastResponse>;

    /// Half-close the stream; no further sends are allowed
    async fn close_send(&mut self) -> Result<()>;
}

/// Handle to an ordering service node
#[async_trait]
pub trait OrdererClient: Send + Sync {
    fn address(&self) -> &str;

    async fn broadcast(&self) -> Result<Box<dyn BroadcastStream>>;

    /// Unfiltered block stream, used to fetch blocks
    async fn deliver(&self) -> Result<Box<dyn DeliverStream>>;
}

/// Submit an envelope and wait for the single acknowledgment
///
/// The stream is closed on every exit path, under the same deadline as the exchange.
pub async fn broadcast_envelope(orderer: &dyn OrdererClient, envelope: &Envelope, timeout: Duration) -> Result<()> {
    let mut stream = orderer.broadcast().await?;

    let result = match tokio::time::timeout(timeout, exchange(stream.as_mut(), envelope)).await {
        Ok(result) => result,
        Err(_) => Err(SdkError::Timeout {
            operation: "broadcast",
            timeout_ms: timeout.as_millis() as u64,
        }),
    };

    // Bounded like the exchange
    match tokio::time::timeout(timeout, stream.close_send()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!("Failed to close broadcast stream to {}: {}", orderer.address(), e),
        Err(_) => tracing::warn!("Closing broadcast stream to {} timed out", orderer.address()),
    }

    match &result {
        Ok(()) => tracing::info!("Envelope accepted by orderer {}", orderer.address()),
        Err(e) => tracing::error!("Broadcast to {} failed: {}", orderer.address(), e),
    }
    result
}

async fn exchange(stream: &mut dyn BroadcastStream, envelope: &Envelope) -> Result<()> {
    stream.send(envelope).await?;
    let ack = stream.recv().await?;
    if ack.status != Status::Success {
        return Err(SdkError::BroadcastRejected {
            status: ack.status,
            info: ack.info,
        });
    }
    Ok(())
}
