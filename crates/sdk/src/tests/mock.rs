//! In-memory node handles

use crate::broadcast::{BroadcastStream, OrdererClient};
use crate::deliver::{DeliverClient, DeliverStream};
use crate::endorser::Endorser;
use crate::error::{Result, SdkError};
use async_trait::async_trait;
use fabric_protos::config::{Config, ConfigEnvelope};
use fabric_protos::{
    decode, encode, Block, BlockData, BlockHeader, BlockMetadata, BroadcastResponse, ChannelHeader, DeliverResponse,
    Endorsement, Envelope, FilteredBlock, FilteredTransaction, Header, HeaderType, LastConfig, Metadata,
    OrdererBlockMetadata, Payload, ProposalResponse, Response, SeekInfo, SeekPosition, SignedProposal, Status,
    Timestamp, TxValidationCode,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Transaction ids the mock orderer accepted, fanned out to deliver streams
#[derive(Clone)]
pub struct Ledger {
    ordered: broadcast::Sender<String>,
}

impl Ledger {
    pub fn new() -> Self {
        let (ordered, _) = broadcast::channel(64);
        Self { ordered }
    }
}

pub enum EndorserBehavior {
    Respond { status: i32, message: String, payload: Vec<u8> },
    Fail(String),
    Hang,
}

pub struct MockEndorser {
    address: String,
    behavior: EndorserBehavior,
    calls: AtomicUsize,
}

impl MockEndorser {
    pub fn new(address: &str, behavior: EndorserBehavior) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn ok(address: &str, payload: &[u8]) -> Arc<Self> {
        Self::status(address, 200, payload)
    }

    pub fn status(address: &str, status: i32, payload: &[u8]) -> Arc<Self> {
        Self::new(
            address,
            EndorserBehavior::Respond {
                status,
                message: if status >= 400 { "simulation failed".into() } else { String::new() },
                payload: payload.to_vec(),
            },
        )
    }

    pub fn failing(address: &str) -> Arc<Self> {
        Self::new(address, EndorserBehavior::Fail("connection refused".into()))
    }

    pub fn hanging(address: &str) -> Arc<Self> {
        Self::new(address, EndorserBehavior::Hang)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Endorser for MockEndorser {
    fn address(&self) -> &str {
        &self.address
    }

    async fn process_proposal(&self, _proposal: &SignedProposal) -> Result<ProposalResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            EndorserBehavior::Respond {
                status,
                message,
                payload,
            } => Ok(ProposalResponse {
                version: 1,
                response: Response {
                    status: *status,
                    message: message.clone(),
                    payload: payload.clone(),
                },
                payload: payload.clone(),
                endorsement: Some(Endorsement {
                    endorser: self.address.as_bytes().to_vec(),
                    signature: b"endorsed".to_vec(),
                }),
            }),
            EndorserBehavior::Fail(reason) => Err(SdkError::transport(&self.address, reason)),
            EndorserBehavior::Hang => std::future::pending().await,
        }
    }
}

pub struct MockOrderer {
    address: String,
    ack: Status,
    /// Accept envelopes but never acknowledge them
    silent: bool,
    ledger: Ledger,
    blocks: Vec<Block>,
    received: Arc<Mutex<Vec<Envelope>>>,
    closes: Arc<AtomicUsize>,
}

impl MockOrderer {
    pub fn new(ledger: &Ledger) -> Arc<Self> {
        Self::with(ledger, Status::Success, Vec::new())
    }

    pub fn with(ledger: &Ledger, ack: Status, blocks: Vec<Block>) -> Arc<Self> {
        Arc::new(Self {
            address: "orderer0:7050".into(),
            ack,
            silent: false,
            ledger: ledger.clone(),
            blocks,
            received: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn silent(ledger: &Ledger) -> Arc<Self> {
        Arc::new(Self {
            address: "orderer0:7050".into(),
            ack: Status::Success,
            silent: true,
            ledger: ledger.clone(),
            blocks: Vec::new(),
            received: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Broadcast streams closed so far
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Envelopes submitted through broadcast
    pub fn received(&self) -> Vec<Envelope> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl OrdererClient for MockOrderer {
    fn address(&self) -> &str {
        &self.address
    }

    async fn broadcast(&self) -> Result<Box<dyn BroadcastStream>> {
        Ok(Box::new(MockBroadcastStream {
            ack: self.ack,
            silent: self.silent,
            ledger: self.ledger.clone(),
            received: self.received.clone(),
            closes: self.closes.clone(),
        }))
    }

    async fn deliver(&self) -> Result<Box<dyn DeliverStream>> {
        Ok(Box::new(MockBlockStream {
            blocks: self.blocks.clone(),
            queue: VecDeque::new(),
        }))
    }
}

struct MockBroadcastStream {
    ack: Status,
    silent: bool,
    ledger: Ledger,
    received: Arc<Mutex<Vec<Envelope>>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BroadcastStream for MockBroadcastStream {
    async fn send(&mut self, envelope: &Envelope) -> Result<()> {
        self.received.lock().push(envelope.clone());
        if self.ack == Status::Success {
            let payload: Payload = decode(&envelope.payload)?;
            if let Some(header) = payload.header {
                let channel_header: ChannelHeader = decode(&header.channel_header)?;
                let _ = self.ledger.ordered.send(channel_header.tx_id);
            }
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<BroadcastResponse> {
        if self.silent {
            return std::future::pending().await;
        }
        Ok(BroadcastResponse {
            status: self.ack,
            info: String::new(),
        })
    }

    async fn close_send(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Answers each seek with the requested block followed by a status
struct MockBlockStream {
    blocks: Vec<Block>,
    queue: VecDeque<DeliverResponse>,
}

#[async_trait]
impl DeliverStream for MockBlockStream {
    async fn send(&mut self, envelope: &Envelope) -> Result<()> {
        let payload: Payload = decode(&envelope.payload)?;
        let seek: SeekInfo = decode(&payload.data)?;
        let block = match seek.start {
            SeekPosition::Newest => self.blocks.last(),
            SeekPosition::Oldest => self.blocks.first(),
            SeekPosition::Specified(number) => self.blocks.iter().find(|b| b.header.number == number),
        };
        match block {
            Some(block) => {
                self.queue.push_back(DeliverResponse::Block(block.clone()));
                self.queue.push_back(DeliverResponse::Status(Status::Success));
            }
            None => self.queue.push_back(DeliverResponse::Status(Status::NotFound)),
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<DeliverResponse> {
        match self.queue.pop_front() {
            Some(response) => Ok(response),
            None => std::future::pending().await,
        }
    }

    async fn close_send(&mut self) -> Result<()> {
        Ok(())
    }
}

pub enum DeliverBehavior {
    /// Report every ordered transaction with this validation code
    Commit(TxValidationCode),
    /// Play these responses, then go quiet
    Scripted(Vec<DeliverResponse>),
    /// Never answer
    Silent,
    /// Never finish opening the stream
    Stalled,
    Unreachable,
}

pub struct MockDeliverClient {
    address: String,
    ledger: Ledger,
    behavior: DeliverBehavior,
}

impl MockDeliverClient {
    pub fn new(address: &str, ledger: &Ledger, behavior: DeliverBehavior) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            ledger: ledger.clone(),
            behavior,
        })
    }
}

#[async_trait]
impl DeliverClient for MockDeliverClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn deliver_filtered(&self) -> Result<Box<dyn DeliverStream>> {
        let stream = match &self.behavior {
            DeliverBehavior::Commit(code) => MockFilteredStream {
                ordered: Some(self.ledger.ordered.subscribe()),
                code: *code,
                queue: VecDeque::new(),
                number: 0,
            },
            DeliverBehavior::Scripted(script) => MockFilteredStream {
                ordered: None,
                code: TxValidationCode::Valid,
                queue: script.iter().cloned().collect(),
                number: 0,
            },
            DeliverBehavior::Silent => MockFilteredStream {
                ordered: None,
                code: TxValidationCode::Valid,
                queue: VecDeque::new(),
                number: 0,
            },
            DeliverBehavior::Stalled => return std::future::pending().await,
            DeliverBehavior::Unreachable => return Err(SdkError::transport(&self.address, "connection refused")),
        };
        Ok(Box::new(stream))
    }
}

struct MockFilteredStream {
    ordered: Option<broadcast::Receiver<String>>,
    code: TxValidationCode,
    queue: VecDeque<DeliverResponse>,
    number: u64,
}

#[async_trait]
impl DeliverStream for MockFilteredStream {
    async fn send(&mut self, _envelope: &Envelope) -> Result<()> {
        Ok(())
    }

    async fn recv(&mut self) -> Result<DeliverResponse> {
        if let Some(response) = self.queue.pop_front() {
            return Ok(response);
        }
        let Some(ordered) = self.ordered.as_mut() else {
            return std::future::pending().await;
        };
        match ordered.recv().await {
            Ok(tx_id) => {
                self.number += 1;
                Ok(DeliverResponse::FilteredBlock(filtered_block(self.number, &tx_id, self.code)))
            }
            Err(_) => std::future::pending().await,
        }
    }

    async fn close_send(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn filtered_block(number: u64, tx_id: &str, code: TxValidationCode) -> FilteredBlock {
    FilteredBlock {
        channel_id: "mychannel".into(),
        number,
        filtered_transactions: vec![FilteredTransaction {
            tx_id: tx_id.to_string(),
            header_type: HeaderType::EndorserTransaction,
            validation_code: code,
        }],
    }
}

fn block(number: u64, last_config: u64, data: Vec<Vec<u8>>) -> Block {
    let orderer_metadata = OrdererBlockMetadata {
        last_config: LastConfig { index: last_config },
        consenter_metadata: Vec::new(),
    };
    Block {
        header: BlockHeader {
            number,
            previous_hash: Vec::new(),
            data_hash: Vec::new(),
        },
        data: BlockData { data },
        metadata: BlockMetadata {
            metadata: vec![encode(&Metadata {
                value: encode(&orderer_metadata),
                signatures: Vec::new(),
            })],
        },
    }
}

/// Block holding `config` as its only transaction
pub fn config_block(number: u64, config: &Config) -> Block {
    let channel_header = ChannelHeader {
        header_type: HeaderType::Config,
        version: 0,
        timestamp: Timestamp::default(),
        channel_id: "mychannel".into(),
        tx_id: String::new(),
        epoch: 0,
        extension: Vec::new(),
        tls_cert_hash: None,
    };
    let envelope = Envelope {
        payload: encode(&Payload {
            header: Some(Header {
                channel_header: encode(&channel_header),
                signature_header: Vec::new(),
            }),
            data: encode(&ConfigEnvelope {
                config: config.clone(),
                last_update: None,
            }),
        }),
        signature: Vec::new(),
    };
    block(number, number, vec![encode(&envelope)])
}

/// Empty block pointing back at config block `last_config`
pub fn data_block(number: u64, last_config: u64) -> Block {
    block(number, last_config, Vec::new())
}
