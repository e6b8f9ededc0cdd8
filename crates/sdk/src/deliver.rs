//! Commit confirmation across several peers
//!
//! A [`DeliverGroup`] follows the filtered block stream of every committing
//! peer until each one reports the target transaction:
//! - `connect` opens every stream and sends a signed "newest onward" seek
//! - `wait` reads every stream concurrently until the transaction shows up
//! - the first failure wins the shared error slot and ends the connect or wait
//! - a deadline aborts every outstanding read

use crate::envelope::seek_envelope;
use crate::error::{DeliverPhase, Result, SdkError};
use crate::signer::Signer;
use async_trait::async_trait;
use fabric_protos::{DeliverResponse, Envelope, SeekInfo, TxValidationCode};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Bidirectional deliver session: seek requests out, blocks and status in
#[async_trait]
pub trait DeliverStream: Send {
    async fn send(&mut self, envelope: &Envelope) -> Result<()>;

    async fn recv(&mut self) -> Result<DeliverResponse>;

    async fn close_send(&mut self) -> Result<()>;
}

/// Handle to a peer's filtered block service
#[async_trait]
pub trait DeliverClient: Send + Sync {
    fn address(&self) -> &str;

    /// Open a filtered block stream; the caller sends the seek
    async fn deliver_filtered(&self) -> Result<Box<dyn DeliverStream>>;
}

#[derive(Debug, Default)]
struct GroupState {
    error: Option<SdkError>,
    confirmed: usize,
}

impl GroupState {
    /// Keep the first error, drop the rest
    fn record_error(&mut self, address: &str, error: SdkError) {
        if self.error.is_none() {
            tracing::warn!("Deliver from {} failed: {}", address, error);
            self.error = Some(error);
        } else {
            tracing::debug!("Ignoring later deliver error from {}: {}", address, error);
        }
    }
}

/// Commit confirmation session for one transaction
pub struct DeliverGroup {
    clients: Vec<Arc<dyn DeliverClient>>,
    signer: Arc<dyn Signer>,
    channel_id: String,
    tx_id: String,
    tls_cert_hash: Option<Vec<u8>>,
    streams: Vec<(String, Box<dyn DeliverStream>)>,
    state: Arc<Mutex<GroupState>>,
}

impl DeliverGroup {
    /// Group watching `clients` for `tx_id` on `channel_id`; nothing is opened until [`connect`](Self::connect)
    pub fn new(
        clients: Vec<Arc<dyn DeliverClient>>,
        signer: Arc<dyn Signer>,
        channel_id: impl Into<String>,
        tx_id: impl Into<String>,
    ) -> Self {
        Self {
            clients,
            signer,
            channel_id: channel_id.into(),
            tx_id: tx_id.into(),
            tls_cert_hash: None,
            streams: Vec::new(),
            state: Arc::new(Mutex::new(GroupState::default())),
        }
    }

    /// Bind seek requests to the client TLS certificate
    pub fn with_tls_cert_hash(mut self, hash: Vec<u8>) -> Self {
        self.tls_cert_hash = Some(hash);
        self
    }

    /// Transaction being waited for
    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    /// Number of peers that confirmed the transaction as valid
    pub fn confirmed(&self) -> usize {
        self.state.lock().confirmed
    }

    /// Open a stream on every peer and subscribe from the newest block
    ///
    /// Fails on the first peer that cannot be reached; streams already open are dropped.
    pub async fn connect(&mut self, timeout: Duration) -> Result<()> {
        let mut tasks = JoinSet::new();
        for client in &self.clients {
            let client = client.clone();
            let signer = self.signer.clone();
            let channel_id = self.channel_id.clone();
            let tls_cert_hash = self.tls_cert_hash.clone();

            tasks.spawn(async move {
                let address = client.address().to_string();
                let result = async {
                    let mut stream = client.deliver_filtered().await?;
                    let seek = seek_envelope(&channel_id, signer.as_ref(), &SeekInfo::newest_onward(), tls_cert_hash)?;
                    stream.send(&seek).await?;
                    Ok::<_, SdkError>(stream)
                }
                .await;
                (address, result)
            });
        }

        let state = self.state.clone();
        let streams = &mut self.streams;
        let connect_all = async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((address, Ok(stream))) => streams.push((address, stream)),
                    Ok((address, Err(e))) => state.lock().record_error(&address, e),
                    Err(e) => state.lock().record_error("deliver task", SdkError::transport("deliver task", e)),
                }
                if state.lock().error.is_some() {
                    break;
                }
            }
        };

        if tokio::time::timeout(timeout, connect_all).await.is_err() {
            self.streams.clear();
            return Err(self.timeout_error(DeliverPhase::Connect, timeout));
        }
        if let Some(e) = self.state.lock().error.take() {
            self.streams.clear();
            return Err(e);
        }

        tracing::debug!("Deliver group connected to {} peers for txid {}", self.streams.len(), self.tx_id);
        Ok(())
    }

    /// Wait until every peer reports the transaction as valid
    pub async fn wait(&mut self, timeout: Duration) -> Result<()> {
        let mut tasks = JoinSet::new();
        for (address, stream) in self.streams.drain(..) {
            let tx_id = self.tx_id.clone();
            let state = self.state.clone();

            tasks.spawn(async move {
                match wait_for_tx(&address, stream, &tx_id).await {
                    Ok(()) => state.lock().confirmed += 1,
                    Err(e) => state.lock().record_error(&address, e),
                }
            });
        }

        let state = self.state.clone();
        let wait_all = async {
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    state.lock().record_error("deliver task", SdkError::transport("deliver task", e));
                }
                if state.lock().error.is_some() {
                    // Remaining streams are aborted when the set drops
                    break;
                }
            }
        };

        if tokio::time::timeout(timeout, wait_all).await.is_err() {
            return Err(self.timeout_error(DeliverPhase::Wait, timeout));
        }
        if let Some(e) = self.state.lock().error.take() {
            return Err(e);
        }

        tracing::info!("Transaction {} committed on {} peers", self.tx_id, self.confirmed());
        Ok(())
    }

    fn timeout_error(&self, phase: DeliverPhase, timeout: Duration) -> SdkError {
        tracing::warn!("Deliver group {} timed out for txid {}", phase, self.tx_id);
        SdkError::DeliverTimeout {
            phase,
            tx_id: self.tx_id.clone(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }
}

async fn wait_for_tx(address: &str, mut stream: Box<dyn DeliverStream>, tx_id: &str) -> Result<()> {
    let result = loop {
        let block = match stream.recv().await {
            Ok(DeliverResponse::FilteredBlock(block)) => block,
            Ok(DeliverResponse::Status(status)) => {
                break Err(SdkError::DeliverCompleted {
                    tx_id: tx_id.to_string(),
                    address: address.to_string(),
                    status,
                })
            }
            Ok(DeliverResponse::Block(block)) => {
                break Err(SdkError::UnexpectedDeliverResponse {
                    address: address.to_string(),
                    detail: format!("full block {} on a filtered stream", block.header.number),
                })
            }
            Err(e) => break Err(e),
        };

        let matched = block.filtered_transactions.iter().find(|tx| tx.tx_id == tx_id);
        if let Some(tx) = matched {
            tracing::debug!("Txid {} found in block {} on {}", tx_id, block.number, address);
            break match tx.validation_code {
                TxValidationCode::Valid => Ok(()),
                code => Err(SdkError::TxInvalidated {
                    tx_id: tx_id.to_string(),
                    address: address.to_string(),
                    code,
                }),
            };
        }
    };

    if let Err(e) = stream.close_send().await {
        tracing::debug!("Failed to close deliver stream to {}: {}", address, e);
    }
    result
}
