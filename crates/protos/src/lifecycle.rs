//! Chaincode lifecycle arguments and results

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct InstallChaincodeArgs {
    pub chaincode_install_package: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct InstallChaincodeResult {
    pub package_id: String,
    pub label: String,
}

/// Where an approving organization gets the chaincode from
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum ChaincodeSource {
    LocalPackage { package_id: String },
    Unavailable,
}

/// Endorsement policy of a chaincode definition
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum ApplicationPolicy {
    SignaturePolicy(String),
    ChannelConfigPolicyReference(String),
}

/// Private data collection definition
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    pub name: String,
    pub policy: String,
    pub required_peer_count: i32,
    pub max_peer_count: i32,
    #[serde(default)]
    pub block_to_live: u64,
    #[serde(default)]
    pub member_only_read: bool,
    #[serde(default)]
    pub member_only_write: bool,
    #[serde(default)]
    pub endorsement_policy: Option<ApplicationPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct CollectionConfigPackage {
    pub config: Vec<CollectionConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ApproveChaincodeDefinitionForMyOrgArgs {
    pub sequence: i64,
    pub name: String,
    pub version: String,
    pub endorsement_plugin: String,
    pub validation_plugin: String,
    /// Encoded `ApplicationPolicy`, empty for the channel default
    pub validation_parameter: Vec<u8>,
    pub collections: Option<CollectionConfigPackage>,
    pub init_required: bool,
    pub source: ChaincodeSource,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct CommitChaincodeDefinitionArgs {
    pub sequence: i64,
    pub name: String,
    pub version: String,
    pub endorsement_plugin: String,
    pub validation_plugin: String,
    pub validation_parameter: Vec<u8>,
    pub collections: Option<CollectionConfigPackage>,
    pub init_required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct QueryInstalledChaincodesArgs {}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct InstalledChaincode {
    pub package_id: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct QueryInstalledChaincodesResult {
    pub installed_chaincodes: Vec<InstalledChaincode>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct QueryApprovedChaincodeDefinitionArgs {
    pub name: String,
    /// Zero selects the latest approved sequence
    pub sequence: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct QueryApprovedChaincodeDefinitionResult {
    pub sequence: i64,
    pub version: String,
    pub endorsement_plugin: String,
    pub validation_plugin: String,
    pub validation_parameter: Vec<u8>,
    pub collections: Option<CollectionConfigPackage>,
    pub init_required: bool,
    pub source: ChaincodeSource,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct QueryChaincodeDefinitionArgs {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct QueryChaincodeDefinitionResult {
    pub sequence: i64,
    pub version: String,
    pub endorsement_plugin: String,
    pub validation_plugin: String,
    pub validation_parameter: Vec<u8>,
    pub collections: Option<CollectionConfigPackage>,
    pub init_required: bool,
    /// Approval state per organization
    pub approvals: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct QueryChaincodeDefinitionsArgs {}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChaincodeDefinition {
    pub name: String,
    pub sequence: i64,
    pub version: String,
    pub endorsement_plugin: String,
    pub validation_plugin: String,
    pub init_required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct QueryChaincodeDefinitionsResult {
    pub chaincode_definitions: Vec<ChaincodeDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct CheckCommitReadinessArgs {
    pub sequence: i64,
    pub name: String,
    pub version: String,
    pub endorsement_plugin: String,
    pub validation_plugin: String,
    pub validation_parameter: Vec<u8>,
    pub init_required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct CheckCommitReadinessResult {
    pub approvals: BTreeMap<String, bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_config_from_json() {
        let json = r#"[{"name":"private","policy":"OR('Org1.member')","requiredPeerCount":1,"maxPeerCount":2,"blockToLive":100}]"#;
        let configs: Vec<CollectionConfig> = serde_json::from_str(json).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].required_peer_count, 1);
        assert_eq!(configs[0].block_to_live, 100);
        assert!(!configs[0].member_only_read);
    }
}
