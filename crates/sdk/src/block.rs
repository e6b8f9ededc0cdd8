//! Block retrieval over an orderer deliver stream

use crate::broadcast::OrdererClient;
use crate::deliver::DeliverStream;
use crate::envelope::seek_envelope;
use crate::error::{Result, SdkError};
use crate::signer::Signer;
use fabric_protos::config::ConfigEnvelope;
use fabric_protos::{
    decode, Block, BlockMetadataIndex, DeliverResponse, Envelope, HeaderType, LastConfig, Metadata,
    OrdererBlockMetadata, Payload, SeekInfo, SeekPosition, Status,
};
use std::time::Duration;

/// Reads single blocks from a channel's ordering service
pub struct BlockFetcher<'a> {
    orderer: &'a dyn OrdererClient,
    signer: &'a dyn Signer,
    channel_id: String,
    best_effort: bool,
    tls_cert_hash: Option<Vec<u8>>,
    timeout: Duration,
}

impl<'a> BlockFetcher<'a> {
    pub fn new(orderer: &'a dyn OrdererClient, signer: &'a dyn Signer, channel_id: impl Into<String>) -> Self {
        Self {
            orderer,
            signer,
            channel_id: channel_id.into(),
            best_effort: false,
            tls_cert_hash: None,
            timeout: Duration::from_secs(10),
        }
    }

    /// Ask the orderer to answer with what it has instead of failing
    pub fn best_effort(mut self, best_effort: bool) -> Self {
        self.best_effort = best_effort;
        self
    }

    pub fn tls_cert_hash(mut self, hash: Option<Vec<u8>>) -> Self {
        self.tls_cert_hash = hash;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn get_specified_block(&self, number: u64) -> Result<Block> {
        self.fetch(SeekPosition::Specified(number)).await
    }

    pub async fn get_newest_block(&self) -> Result<Block> {
        self.fetch(SeekPosition::Newest).await
    }

    pub async fn get_oldest_block(&self) -> Result<Block> {
        self.fetch(SeekPosition::Oldest).await
    }

    /// Latest configuration block of the channel
    pub async fn get_config_block(&self) -> Result<Block> {
        let newest = self.get_newest_block().await?;
        let index = last_config_index(&newest)?;
        tracing::debug!(
            "Newest block {} of {} points at config block {}",
            newest.header.number,
            self.channel_id,
            index
        );
        if index == newest.header.number {
            return Ok(newest);
        }
        self.get_specified_block(index).await
    }

    async fn fetch(&self, position: SeekPosition) -> Result<Block> {
        let seek = SeekInfo::single(position, self.best_effort);
        let envelope = seek_envelope(&self.channel_id, self.signer, &seek, self.tls_cert_hash.clone())?;

        let mut stream = self.orderer.deliver().await?;
        let read = read_block(self.orderer.address(), stream.as_mut(), &envelope);
        let result = match tokio::time::timeout(self.timeout, read).await {
            Ok(result) => result,
            Err(_) => Err(SdkError::Timeout {
                operation: "block fetch",
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };
        if let Err(e) = stream.close_send().await {
            tracing::debug!("Failed to close deliver stream to {}: {}", self.orderer.address(), e);
        }
        result
    }
}

async fn read_block(address: &str, stream: &mut dyn DeliverStream, seek: &Envelope) -> Result<Block> {
    stream.send(seek).await?;
    match stream.recv().await? {
        DeliverResponse::Block(block) => {
            // A status message trails every block
            match stream.recv().await {
                Ok(DeliverResponse::Status(Status::Success)) => {}
                Ok(other) => tracing::warn!("Unexpected message after block {}: {:?}", block.header.number, other),
                Err(e) => tracing::warn!("Failed to read status after block {}: {}", block.header.number, e),
            }
            Ok(block)
        }
        DeliverResponse::Status(status) => Err(SdkError::UnexpectedDeliverResponse {
            address: address.to_string(),
            detail: format!("can't read the block: {}", status),
        }),
        DeliverResponse::FilteredBlock(block) => Err(SdkError::UnexpectedDeliverResponse {
            address: address.to_string(),
            detail: format!("filtered block {} on a block stream", block.number),
        }),
    }
}

fn metadata_at(block: &Block, index: BlockMetadataIndex) -> Result<Option<Metadata>> {
    match block.metadata.metadata.get(index as usize) {
        Some(bytes) if !bytes.is_empty() => Ok(Some(decode(bytes)?)),
        _ => Ok(None),
    }
}

/// Number of the last configuration block as recorded in a block's metadata
pub fn last_config_index(block: &Block) -> Result<u64> {
    if let Some(metadata) = metadata_at(block, BlockMetadataIndex::Signatures)? {
        if !metadata.value.is_empty() {
            let orderer_metadata: OrdererBlockMetadata = decode(&metadata.value)?;
            return Ok(orderer_metadata.last_config.index);
        }
    }

    // Older orderers only fill the dedicated slot
    match metadata_at(block, BlockMetadataIndex::LastConfig)? {
        Some(metadata) => {
            let last_config: LastConfig = decode(&metadata.value)?;
            Ok(last_config.index)
        }
        None => Err(SdkError::InvalidArgument(format!(
            "block {} carries no last config metadata",
            block.header.number
        ))),
    }
}

/// Extract the channel configuration held by a configuration block
pub fn config_from_block(block: &Block) -> Result<ConfigEnvelope> {
    let data = block
        .data
        .data
        .first()
        .ok_or_else(|| SdkError::InvalidArgument(format!("block {} is empty", block.header.number)))?;
    let envelope: Envelope = decode(data)?;
    let payload: Payload = decode(&envelope.payload)?;

    let header = payload
        .header
        .ok_or_else(|| SdkError::InvalidArgument("config block payload has no header".into()))?;
    let channel_header: fabric_protos::ChannelHeader = decode(&header.channel_header)?;
    if channel_header.header_type != HeaderType::Config {
        return Err(SdkError::InvalidArgument(format!(
            "block {} is not a config block ({:?})",
            block.header.number, channel_header.header_type
        )));
    }
    Ok(decode(&payload.data)?)
}
