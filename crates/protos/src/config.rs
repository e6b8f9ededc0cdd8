//! Channel configuration and configuration updates

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const READERS_POLICY: &str = "Readers";
pub const WRITERS_POLICY: &str = "Writers";
pub const ADMINS_POLICY: &str = "Admins";
pub const ENDORSEMENT_POLICY: &str = "Endorsement";
pub const LIFECYCLE_ENDORSEMENT_POLICY: &str = "LifecycleEndorsement";
pub const BLOCK_VALIDATION_POLICY: &str = "BlockValidation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum PolicyKind {
    Signature,
    ImplicitMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Policy {
    pub kind: PolicyKind,
    pub rule: String,
}

impl Policy {
    pub fn signature(rule: impl Into<String>) -> Self {
        Self { kind: PolicyKind::Signature, rule: rule.into() }
    }

    pub fn implicit_meta(rule: impl Into<String>) -> Self {
        Self { kind: PolicyKind::ImplicitMeta, rule: rule.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum OrganizationKind {
    Peer,
    Orderer,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AnchorPeer {
    pub host: String,
    pub port: u16,
}

/// Membership definition of one organization
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Organization {
    /// Name used as the key inside configuration groups
    pub name: String,
    /// Membership provider id carried by the organization's identities
    pub msp_id: String,
    pub kind: OrganizationKind,
    /// DER encoded root certificates
    pub root_certs: Vec<Vec<u8>>,
    pub tls_root_certs: Vec<Vec<u8>>,
    pub admin_certs: Vec<Vec<u8>>,
    pub anchor_peers: Vec<AnchorPeer>,
    pub orderer_endpoints: Vec<String>,
    pub policies: BTreeMap<String, Policy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ApplicationGroup {
    pub organizations: BTreeMap<String, Organization>,
    pub capabilities: Vec<String>,
    pub policies: BTreeMap<String, Policy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ConsortiumGroup {
    pub organizations: BTreeMap<String, Organization>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BatchSize {
    pub max_message_count: u32,
    pub absolute_max_bytes: u32,
    pub preferred_max_bytes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct OrdererGroup {
    pub orderer_type: String,
    pub batch_timeout_ms: u64,
    pub batch_size: BatchSize,
    pub organizations: BTreeMap<String, Organization>,
    pub policies: BTreeMap<String, Policy>,
}

/// Root configuration group of a channel
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChannelGroup {
    /// Consortium the channel was created from (application channels)
    pub consortium: Option<String>,
    pub application: Option<ApplicationGroup>,
    pub orderer: Option<OrdererGroup>,
    /// Consortium definitions (system channel only)
    pub consortiums: BTreeMap<String, ConsortiumGroup>,
    pub capabilities: Vec<String>,
    pub policies: BTreeMap<String, Policy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Config {
    pub sequence: u64,
    pub channel_group: ChannelGroup,
}

/// Data of the single envelope held by a configuration block
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ConfigEnvelope {
    pub config: Config,
    pub last_update: Option<crate::common::Envelope>,
}

/// Delta between two configuration states
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub channel_id: String,
    /// Configuration sequence the update was computed against
    pub read_sequence: u64,
    pub read_set: ChannelGroup,
    pub write_set: ChannelGroup,
}

/// Configuration update plus the organization signatures endorsing it
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ConfigUpdateEnvelope {
    /// Encoded `ConfigUpdate`
    pub config_update: Vec<u8>,
    pub signatures: Vec<crate::common::ConfigSignature>,
}
