//! WebSocket node handles

use super::{Frame, Service};
use crate::broadcast::{BroadcastStream, OrdererClient};
use crate::deliver::{DeliverClient, DeliverStream};
use crate::endorser::Endorser;
use crate::error::{Result, SdkError};
use async_trait::async_trait;
use fabric_protos::{BroadcastResponse, DeliverResponse, Envelope, ProposalResponse, SignedProposal};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One open session with a node
struct Connection {
    address: String,
    ws: WsStream,
}

impl Connection {
    async fn open(address: &str, service: Service, timeout: Duration) -> Result<Self> {
        let url = format!("ws://{}", address);
        let (ws, _) = match tokio::time::timeout(timeout, connect_async(&url)).await {
            Ok(result) => result.map_err(|e| SdkError::transport(address, e))?,
            Err(_) => {
                return Err(SdkError::Timeout {
                    operation: "connect",
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };
        tracing::debug!("Connected to {} for {:?}", address, service);

        let mut conn = Self {
            address: address.to_string(),
            ws,
        };
        conn.send(&Frame::Open(service)).await?;
        Ok(conn)
    }

    async fn send(&mut self, frame: &Frame) -> Result<()> {
        self.ws
            .send(Message::Binary(frame.to_bytes()))
            .await
            .map_err(|e| SdkError::transport(&self.address, e))
    }

    async fn recv(&mut self) -> Result<Frame> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return match Frame::from_bytes(&data)? {
                        Frame::Error(reason) => Err(SdkError::transport(&self.address, reason)),
                        frame => Ok(frame),
                    };
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(SdkError::transport(&self.address, "connection closed"));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SdkError::transport(&self.address, e)),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self.ws.close(None).await {
            Ok(()) => Ok(()),
            // Closing an already closed socket is fine
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(SdkError::transport(&self.address, e)),
        }
    }

    fn unexpected(&self, expected: &str, frame: &Frame) -> SdkError {
        SdkError::transport(
            &self.address,
            format!("expected {}, got {}", expected, frame.name()),
        )
    }
}

/// Endorsing peer reached over WebSocket; one session per proposal
#[derive(Debug, Clone)]
pub struct WsEndorser {
    address: String,
    connect_timeout: Duration,
}

impl WsEndorser {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Endorser for WsEndorser {
    fn address(&self) -> &str {
        &self.address
    }

    async fn process_proposal(&self, proposal: &SignedProposal) -> Result<ProposalResponse> {
        let mut conn = Connection::open(&self.address, Service::Endorser, self.connect_timeout).await?;
        conn.send(&Frame::Proposal(proposal.clone())).await?;
        let response = match conn.recv().await? {
            Frame::ProposalResponse(response) => response,
            other => return Err(conn.unexpected("proposal response", &other)),
        };
        if let Err(e) = conn.close().await {
            tracing::debug!("Failed to close endorser session: {}", e);
        }
        Ok(response)
    }
}

/// Ordering service node reached over WebSocket
#[derive(Debug, Clone)]
pub struct WsOrderer {
    address: String,
    connect_timeout: Duration,
}

impl WsOrderer {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl OrdererClient for WsOrderer {
    fn address(&self) -> &str {
        &self.address
    }

    async fn broadcast(&self) -> Result<Box<dyn BroadcastStream>> {
        let conn = Connection::open(&self.address, Service::Broadcast, self.connect_timeout).await?;
        Ok(Box::new(WsBroadcastStream { conn }))
    }

    async fn deliver(&self) -> Result<Box<dyn DeliverStream>> {
        let conn = Connection::open(&self.address, Service::Deliver, self.connect_timeout).await?;
        Ok(Box::new(WsDeliverStream { conn }))
    }
}

/// Peer filtered block service reached over WebSocket
#[derive(Debug, Clone)]
pub struct WsDeliverClient {
    address: String,
    connect_timeout: Duration,
}

impl WsDeliverClient {
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl DeliverClient for WsDeliverClient {
    fn address(&self) -> &str {
        &self.address
    }

    async fn deliver_filtered(&self) -> Result<Box<dyn DeliverStream>> {
        let conn = Connection::open(&self.address, Service::DeliverFiltered, self.connect_timeout).await?;
        Ok(Box::new(WsDeliverStream { conn }))
    }
}

struct WsBroadcastStream {
    conn: Connection,
}

#[async_trait]
impl BroadcastStream for WsBroadcastStream {
    async fn send(&mut self, envelope: &Envelope) -> Result<()> {
        self.conn.send(&Frame::Envelope(envelope.clone())).await
    }

    async fn recv(&mut self) -> Result<BroadcastResponse> {
        match self.conn.recv().await? {
            Frame::Broadcast(response) => Ok(response),
            other => Err(self.conn.unexpected("broadcast response", &other)),
        }
    }

    async fn close_send(&mut self) -> Result<()> {
        self.conn.close().await
    }
}

struct WsDeliverStream {
    conn: Connection,
}

#[async_trait]
impl DeliverStream for WsDeliverStream {
    async fn send(&mut self, envelope: &Envelope) -> Result<()> {
        self.conn.send(&Frame::Envelope(envelope.clone())).await
    }

    async fn recv(&mut self) -> Result<DeliverResponse> {
        match self.conn.recv().await? {
            Frame::Deliver(response) => Ok(response),
            other => Err(self.conn.unexpected("deliver response", &other)),
        }
    }

    async fn close_send(&mut self) -> Result<()> {
        self.conn.close().await
    }
}
