//! Endorser-side messages: proposals, responses, transactions and filtered blocks

use crate::common::{Block, Status};
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Runtime a chaincode is written for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum ChaincodeLang {
    #[default]
    Undefined,
    Golang,
    Node,
    Car,
    Java,
}

impl std::str::FromStr for ChaincodeLang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "" | "UNDEFINED" => Ok(ChaincodeLang::Undefined),
            "GOLANG" | "GO" => Ok(ChaincodeLang::Golang),
            "NODE" => Ok(ChaincodeLang::Node),
            "CAR" => Ok(ChaincodeLang::Car),
            "JAVA" => Ok(ChaincodeLang::Java),
            other => Err(format!("unknown chaincode language '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChaincodeId {
    pub path: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChaincodeInput {
    pub args: Vec<Vec<u8>>,
    pub is_init: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChaincodeSpec {
    pub lang: ChaincodeLang,
    pub chaincode_id: ChaincodeId,
    pub input: ChaincodeInput,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChaincodeInvocationSpec {
    pub chaincode_spec: ChaincodeSpec,
}

/// Extension placed in the channel header of endorser transactions
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChaincodeHeaderExtension {
    pub chaincode_id: ChaincodeId,
}

/// Proposal payload: the encoded invocation spec plus private transient data
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChaincodeProposalPayload {
    pub input: Vec<u8>,
    /// Never copied into the transaction
    pub transient_map: BTreeMap<String, Vec<u8>>,
}

/// Proposal sent to endorsers; both fields are encoded messages
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Proposal {
    /// Encoded `Header`
    pub header: Vec<u8>,
    /// Encoded `ChaincodeProposalPayload`
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SignedProposal {
    pub proposal_bytes: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Application level result of a chaincode invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Response {
    pub status: i32,
    pub message: String,
    pub payload: Vec<u8>,
}

/// An endorser's signature over its proposal response payload
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Endorsement {
    pub endorser: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ProposalResponse {
    pub version: i32,
    pub response: Response,
    /// Opaque simulation result; must be identical across endorsers
    pub payload: Vec<u8>,
    pub endorsement: Option<Endorsement>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChaincodeEndorsedAction {
    pub proposal_response_payload: Vec<u8>,
    pub endorsements: Vec<Endorsement>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChaincodeActionPayload {
    pub chaincode_proposal_payload: Vec<u8>,
    pub action: ChaincodeEndorsedAction,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct TransactionAction {
    /// Encoded `SignatureHeader` of the proposal creator
    pub header: Vec<u8>,
    /// Encoded `ChaincodeActionPayload`
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Transaction {
    pub actions: Vec<TransactionAction>,
}

/// Final validation outcome of a transaction as reported by a committing peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum TxValidationCode {
    Valid,
    NilEnvelope,
    BadPayload,
    BadCommonHeader,
    BadCreatorSignature,
    InvalidEndorserTransaction,
    InvalidConfigTransaction,
    UnsupportedTxPayload,
    BadProposalTxid,
    DuplicateTxid,
    EndorsementPolicyFailure,
    MvccReadConflict,
    PhantomReadConflict,
    UnknownTxType,
    TargetChainNotFound,
    MarshalTxError,
    NilTxaction,
    ExpiredChaincode,
    ChaincodeVersionConflict,
    BadHeaderExtension,
    BadChannelHeader,
    BadResponsePayload,
    BadRwset,
    IllegalWriteset,
    InvalidWriteset,
    InvalidChaincode,
    NotValidated,
    InvalidOtherReason,
}

impl std::fmt::Display for TxValidationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct FilteredTransaction {
    pub tx_id: String,
    pub header_type: crate::common::HeaderType,
    pub validation_code: TxValidationCode,
}

/// Block stripped down to transaction ids and validation codes
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct FilteredBlock {
    pub channel_id: String,
    pub number: u64,
    pub filtered_transactions: Vec<FilteredTransaction>,
}

/// Message received on a deliver stream
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum DeliverResponse {
    Status(Status),
    Block(Block),
    FilteredBlock(FilteredBlock),
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_id: String,
}

/// Channels a peer has joined
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChannelQueryResponse {
    pub channels: Vec<ChannelInfo>,
}
