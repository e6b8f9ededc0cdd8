//! Common envelope, header and block types

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Kind of message carried in a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum HeaderType {
    Message,
    Config,
    ConfigUpdate,
    EndorserTransaction,
    DeliverSeekInfo,
}

/// Wall clock time carried in channel headers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

/// Channel scoped part of a header
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChannelHeader {
    pub header_type: HeaderType,
    pub version: i32,
    pub timestamp: Timestamp,
    /// Empty for channel-less requests (install, list channels, join)
    pub channel_id: String,
    /// Empty for envelopes that are not transactions (seek info, config update)
    pub tx_id: String,
    pub epoch: u64,
    /// Encoded extension (chaincode header extension for endorser transactions)
    pub extension: Vec<u8>,
    /// Hash of the client TLS certificate when the request is bound to a TLS session
    pub tls_cert_hash: Option<Vec<u8>>,
}

/// Creator identity plus a single-use nonce
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SignatureHeader {
    pub creator: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// Both header parts, each kept in encoded form so signatures stay stable
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Header {
    pub channel_header: Vec<u8>,
    pub signature_header: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Payload {
    pub header: Option<Header>,
    pub data: Vec<u8>,
}

/// Signed payload; the unit submitted to the ordering service
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Envelope {
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Identity as serialized by a signer
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SerializedIdentity {
    /// Organization (membership provider) identifier
    pub org_id: String,
    /// Public credential bytes
    pub id_bytes: Vec<u8>,
}

/// Status codes reported by the ordering service and deliver streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum Status {
    Unknown,
    Success,
    BadRequest,
    Forbidden,
    NotFound,
    RequestEntityTooLarge,
    InternalServerError,
    NotImplemented,
    ServiceUnavailable,
}

impl Status {
    /// HTTP-like numeric code
    pub fn code(&self) -> i32 {
        match self {
            Status::Unknown => 0,
            Status::Success => 200,
            Status::BadRequest => 400,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::RequestEntityTooLarge => 413,
            Status::InternalServerError => 500,
            Status::NotImplemented => 501,
            Status::ServiceUnavailable => 503,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Signature contributed by one organization to a configuration update
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ConfigSignature {
    /// Encoded `SignatureHeader`
    pub signature_header: Vec<u8>,
    /// Signature over `signature_header || config_update`
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub previous_hash: Vec<u8>,
    pub data_hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BlockData {
    /// Encoded envelopes
    pub data: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BlockMetadata {
    /// Encoded `Metadata` entries indexed by `BlockMetadataIndex`
    pub metadata: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub data: BlockData,
    pub metadata: BlockMetadata,
}

/// Slots of `BlockMetadata::metadata`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMetadataIndex {
    Signatures = 0,
    LastConfig = 1,
    TransactionsFilter = 2,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct MetadataSignature {
    pub signature_header: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Metadata {
    pub value: Vec<u8>,
    pub signatures: Vec<MetadataSignature>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct LastConfig {
    pub index: u64,
}

/// Value stored in the signatures metadata slot by current orderers
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct OrdererBlockMetadata {
    pub last_config: LastConfig,
    pub consenter_metadata: Vec<u8>,
}

/// Height and tip hashes of a channel ledger
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BlockchainInfo {
    pub height: u64,
    pub current_block_hash: Vec<u8>,
    pub previous_block_hash: Vec<u8>,
}
