//! Proposal construction
//!
//! Every endorser-bound request is one variant of [`ProposalKind`]. A variant
//! carries exactly the fields its operation needs; [`ProposalBuilder::build`]
//! validates them, resolves the target system or user chaincode and returns
//! the proposal together with its transaction id. Nothing here touches the
//! network.

use crate::error::{Result, SdkError};
use crate::signer::{compute_tx_id, Signer};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use fabric_protos::lifecycle::{
    ApplicationPolicy, ApproveChaincodeDefinitionForMyOrgArgs, ChaincodeSource, CheckCommitReadinessArgs,
    CollectionConfig, CollectionConfigPackage, CommitChaincodeDefinitionArgs, InstallChaincodeArgs,
    QueryApprovedChaincodeDefinitionArgs, QueryChaincodeDefinitionArgs, QueryChaincodeDefinitionsArgs,
    QueryInstalledChaincodesArgs,
};
use fabric_protos::{
    encode, ChaincodeHeaderExtension, ChaincodeId, ChaincodeInput, ChaincodeInvocationSpec, ChaincodeLang,
    ChaincodeProposalPayload, ChaincodeSpec, ChannelHeader, Header, HeaderType, Proposal, Timestamp,
};
use std::collections::BTreeMap;

/// Lifecycle system chaincode
pub const LIFECYCLE_CHAINCODE: &str = "_lifecycle";
/// Configuration system chaincode
pub const CSCC: &str = "cscc";
/// Ledger query system chaincode
pub const QSCC: &str = "qscc";

pub const INSTALL_FUNC: &str = "InstallChaincode";
pub const APPROVE_FUNC: &str = "ApproveChaincodeDefinitionForMyOrg";
pub const COMMIT_FUNC: &str = "CommitChaincodeDefinition";
pub const CHECK_COMMIT_READINESS_FUNC: &str = "CheckCommitReadiness";
pub const QUERY_INSTALLED_FUNC: &str = "QueryInstalledChaincodes";
pub const QUERY_APPROVED_FUNC: &str = "QueryApprovedChaincodeDefinition";
pub const QUERY_DEFINITION_FUNC: &str = "QueryChaincodeDefinition";
pub const QUERY_DEFINITIONS_FUNC: &str = "QueryChaincodeDefinitions";
pub const JOIN_CHAIN_FUNC: &str = "JoinChain";
pub const GET_CHANNELS_FUNC: &str = "GetChannels";
pub const GET_CHAIN_INFO_FUNC: &str = "GetChainInfo";

/// Chaincode definition shared by approve, commit and readiness checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChaincodeDefinition {
    pub name: String,
    pub version: String,
    pub sequence: i64,
    pub endorsement_plugin: String,
    pub validation_plugin: String,
    /// Signature policy expression, e.g. `OR('Org1MSP.member')`
    pub signature_policy: Option<String>,
    /// Reference to a channel config policy, e.g. `/Channel/Application/Endorsement`
    pub channel_config_policy: Option<String>,
    pub collections: Option<CollectionConfigPackage>,
    pub init_required: bool,
}

impl ChaincodeDefinition {
    pub fn new(name: impl Into<String>, version: impl Into<String>, sequence: i64) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            sequence,
            ..Default::default()
        }
    }

    pub fn with_signature_policy(mut self, policy: impl Into<String>) -> Self {
        self.signature_policy = Some(policy.into());
        self
    }

    pub fn with_channel_config_policy(mut self, policy: impl Into<String>) -> Self {
        self.channel_config_policy = Some(policy.into());
        self
    }

    pub fn with_collections(mut self, collections: CollectionConfigPackage) -> Self {
        self.collections = Some(collections);
        self
    }

    pub fn with_init_required(mut self, init_required: bool) -> Self {
        self.init_required = init_required;
        self
    }

    /// Encoded endorsement policy; empty when the channel default applies
    pub fn validation_parameter(&self) -> Result<Vec<u8>> {
        application_policy(self.signature_policy.as_deref(), self.channel_config_policy.as_deref())
    }
}

/// Chaincode invocation: invoke, query and send-only share this shape
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub chaincode: ChaincodeId,
    pub lang: ChaincodeLang,
    pub args: Vec<Vec<u8>>,
    /// JSON object of base64 values, kept out of the final transaction
    pub transient: Option<String>,
    pub is_init: bool,
}

impl Invocation {
    pub fn new(name: impl Into<String>, args: Vec<Vec<u8>>) -> Self {
        Self {
            chaincode: ChaincodeId {
                name: name.into(),
                ..Default::default()
            },
            args,
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.chaincode.version = version.into();
        self
    }

    pub fn with_lang(mut self, lang: ChaincodeLang) -> Self {
        self.lang = lang;
        self
    }

    pub fn with_transient(mut self, transient: impl Into<String>) -> Self {
        self.transient = Some(transient.into());
        self
    }

    pub fn with_init(mut self, is_init: bool) -> Self {
        self.is_init = is_init;
        self
    }
}

/// Every request kind sent to endorsing peers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalKind {
    Install { package: Vec<u8> },
    Approve {
        definition: ChaincodeDefinition,
        /// Installed package to run; `None` approves without a local package
        package_id: Option<String>,
    },
    Commit { definition: ChaincodeDefinition },
    CheckCommitReadiness { definition: ChaincodeDefinition },
    QueryInstalled,
    QueryApproved { name: String, sequence: i64 },
    /// Single definition when a name is given, all definitions otherwise
    QueryCommitted { name: Option<String> },
    Invoke(Invocation),
    Query(Invocation),
    SendOnly(Invocation),
    JoinChannel { genesis_block: Vec<u8> },
    ListChannels,
    ChainInfo,
}

impl ProposalKind {
    /// Whether the request needs a channel id in its header
    pub fn is_channel_scoped(&self) -> bool {
        !matches!(
            self,
            ProposalKind::Install { .. }
                | ProposalKind::QueryInstalled
                | ProposalKind::JoinChannel { .. }
                | ProposalKind::ListChannels
        )
    }

    fn header_type(&self) -> HeaderType {
        match self {
            ProposalKind::JoinChannel { .. } => HeaderType::Config,
            _ => HeaderType::EndorserTransaction,
        }
    }

    /// Resolve the invocation spec and transient data this request carries
    fn invocation_spec(&self, channel_id: &str) -> Result<(ChaincodeSpec, BTreeMap<String, Vec<u8>>)> {
        let system = |name: &str, lang: ChaincodeLang, args: Vec<Vec<u8>>| ChaincodeSpec {
            lang,
            chaincode_id: ChaincodeId {
                name: name.to_string(),
                ..Default::default()
            },
            input: ChaincodeInput { args, is_init: false },
        };
        let lifecycle = |func: &str, args: Vec<u8>| {
            system(
                LIFECYCLE_CHAINCODE,
                ChaincodeLang::Undefined,
                vec![func.as_bytes().to_vec(), args],
            )
        };

        let spec = match self {
            ProposalKind::Install { package } => {
                if package.is_empty() {
                    return Err(SdkError::InvalidArgument("chaincode install package is empty".into()));
                }
                lifecycle(
                    INSTALL_FUNC,
                    encode(&InstallChaincodeArgs {
                        chaincode_install_package: package.clone(),
                    }),
                )
            }
            ProposalKind::Approve { definition, package_id } => {
                validate_definition(definition)?;
                let source = match package_id.as_deref() {
                    Some(id) if !id.is_empty() => ChaincodeSource::LocalPackage {
                        package_id: id.to_string(),
                    },
                    _ => ChaincodeSource::Unavailable,
                };
                lifecycle(
                    APPROVE_FUNC,
                    encode(&ApproveChaincodeDefinitionForMyOrgArgs {
                        sequence: definition.sequence,
                        name: definition.name.clone(),
                        version: definition.version.clone(),
                        endorsement_plugin: definition.endorsement_plugin.clone(),
                        validation_plugin: definition.validation_plugin.clone(),
                        validation_parameter: definition.validation_parameter()?,
                        collections: definition.collections.clone(),
                        init_required: definition.init_required,
                        source,
                    }),
                )
            }
            ProposalKind::Commit { definition } => {
                validate_definition(definition)?;
                lifecycle(
                    COMMIT_FUNC,
                    encode(&CommitChaincodeDefinitionArgs {
                        sequence: definition.sequence,
                        name: definition.name.clone(),
                        version: definition.version.clone(),
                        endorsement_plugin: definition.endorsement_plugin.clone(),
                        validation_plugin: definition.validation_plugin.clone(),
                        validation_parameter: definition.validation_parameter()?,
                        collections: definition.collections.clone(),
                        init_required: definition.init_required,
                    }),
                )
            }
            ProposalKind::CheckCommitReadiness { definition } => {
                if definition.name.is_empty() {
                    return Err(SdkError::InvalidArgument("chaincode name is required".into()));
                }
                lifecycle(
                    CHECK_COMMIT_READINESS_FUNC,
                    encode(&CheckCommitReadinessArgs {
                        sequence: if definition.sequence == 0 { 1 } else { definition.sequence },
                        name: definition.name.clone(),
                        version: definition.version.clone(),
                        endorsement_plugin: definition.endorsement_plugin.clone(),
                        validation_plugin: definition.validation_plugin.clone(),
                        validation_parameter: definition.validation_parameter()?,
                        init_required: definition.init_required,
                    }),
                )
            }
            ProposalKind::QueryInstalled => lifecycle(QUERY_INSTALLED_FUNC, encode(&QueryInstalledChaincodesArgs {})),
            ProposalKind::QueryApproved { name, sequence } => lifecycle(
                QUERY_APPROVED_FUNC,
                encode(&QueryApprovedChaincodeDefinitionArgs {
                    name: name.clone(),
                    sequence: *sequence,
                }),
            ),
            ProposalKind::QueryCommitted { name: Some(name) } => lifecycle(
                QUERY_DEFINITION_FUNC,
                encode(&QueryChaincodeDefinitionArgs { name: name.clone() }),
            ),
            ProposalKind::QueryCommitted { name: None } => {
                lifecycle(QUERY_DEFINITIONS_FUNC, encode(&QueryChaincodeDefinitionsArgs {}))
            }
            ProposalKind::Invoke(invocation) | ProposalKind::Query(invocation) | ProposalKind::SendOnly(invocation) => {
                if invocation.chaincode.name.is_empty() {
                    return Err(SdkError::InvalidArgument("chaincode name is required".into()));
                }
                let transient = match invocation.transient.as_deref() {
                    Some(json) if !json.trim().is_empty() => parse_transient(json)?,
                    _ => BTreeMap::new(),
                };
                let spec = ChaincodeSpec {
                    lang: invocation.lang,
                    chaincode_id: invocation.chaincode.clone(),
                    input: ChaincodeInput {
                        args: invocation.args.clone(),
                        is_init: invocation.is_init,
                    },
                };
                return Ok((spec, transient));
            }
            ProposalKind::JoinChannel { genesis_block } => {
                if genesis_block.is_empty() {
                    return Err(SdkError::InvalidArgument("genesis block is required to join".into()));
                }
                system(
                    CSCC,
                    ChaincodeLang::Golang,
                    vec![JOIN_CHAIN_FUNC.as_bytes().to_vec(), genesis_block.clone()],
                )
            }
            ProposalKind::ListChannels => system(CSCC, ChaincodeLang::Golang, vec![GET_CHANNELS_FUNC.as_bytes().to_vec()]),
            ProposalKind::ChainInfo => system(
                QSCC,
                ChaincodeLang::Golang,
                vec![GET_CHAIN_INFO_FUNC.as_bytes().to_vec(), channel_id.as_bytes().to_vec()],
            ),
        };
        Ok((spec, BTreeMap::new()))
    }
}

/// Builds proposals on behalf of one signer
pub struct ProposalBuilder<'a> {
    signer: &'a dyn Signer,
    channel_id: String,
}

impl<'a> ProposalBuilder<'a> {
    pub fn new(signer: &'a dyn Signer) -> Self {
        Self {
            signer,
            channel_id: String::new(),
        }
    }

    pub fn channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    /// Build the proposal and its transaction id
    pub fn build(&self, kind: &ProposalKind) -> Result<(Proposal, String)> {
        let channel_id = if kind.is_channel_scoped() {
            if self.channel_id.is_empty() {
                return Err(SdkError::InvalidArgument("channel id is required".into()));
            }
            self.channel_id.as_str()
        } else {
            ""
        };

        let (spec, transient_map) = kind.invocation_spec(channel_id)?;
        let proposal = create_proposal(self.signer, kind.header_type(), channel_id, spec, transient_map)?;
        tracing::debug!("Built {:?} proposal {}", kind.header_type(), proposal.1);
        Ok(proposal)
    }
}

fn create_proposal(
    signer: &dyn Signer,
    header_type: HeaderType,
    channel_id: &str,
    spec: ChaincodeSpec,
    transient_map: BTreeMap<String, Vec<u8>>,
) -> Result<(Proposal, String)> {
    let signature_header = signer.new_signature_header()?;
    let tx_id = compute_tx_id(&signature_header.nonce, &signature_header.creator);

    let channel_header = ChannelHeader {
        header_type,
        version: 0,
        timestamp: now(),
        channel_id: channel_id.to_string(),
        tx_id: tx_id.clone(),
        epoch: 0,
        extension: encode(&ChaincodeHeaderExtension {
            chaincode_id: spec.chaincode_id.clone(),
        }),
        tls_cert_hash: None,
    };
    let header = Header {
        channel_header: encode(&channel_header),
        signature_header: encode(&signature_header),
    };
    let payload = ChaincodeProposalPayload {
        input: encode(&ChaincodeInvocationSpec { chaincode_spec: spec }),
        transient_map,
    };

    Ok((
        Proposal {
            header: encode(&header),
            payload: encode(&payload),
        },
        tx_id,
    ))
}

pub(crate) fn now() -> Timestamp {
    let now = chrono::Utc::now();
    Timestamp {
        seconds: now.timestamp(),
        nanos: now.timestamp_subsec_nanos() as i32,
    }
}

fn validate_definition(definition: &ChaincodeDefinition) -> Result<()> {
    if definition.name.is_empty() {
        return Err(SdkError::InvalidArgument("chaincode name is required".into()));
    }
    if definition.version.is_empty() {
        return Err(SdkError::InvalidArgument("chaincode version is required".into()));
    }
    if definition.sequence <= 0 {
        return Err(SdkError::InvalidArgument(format!(
            "chaincode sequence must be positive, got {}",
            definition.sequence
        )));
    }
    Ok(())
}

/// Encode the endorsement policy; the two policy forms are mutually exclusive
pub fn application_policy(signature_policy: Option<&str>, channel_config_policy: Option<&str>) -> Result<Vec<u8>> {
    let signature_policy = signature_policy.filter(|p| !p.is_empty());
    let channel_config_policy = channel_config_policy.filter(|p| !p.is_empty());

    let policy = match (signature_policy, channel_config_policy) {
        (None, None) => return Ok(Vec::new()),
        (Some(_), Some(_)) => {
            return Err(SdkError::InvalidArgument(
                "cannot specify both a signature policy and a channel config policy".into(),
            ))
        }
        (Some(expr), None) => {
            validate_signature_policy(expr)?;
            ApplicationPolicy::SignaturePolicy(expr.to_string())
        }
        (None, Some(reference)) => ApplicationPolicy::ChannelConfigPolicyReference(reference.to_string()),
    };
    Ok(encode(&policy))
}

/// Roles a signature policy principal may name
const POLICY_ROLES: [&str; 5] = ["member", "admin", "client", "peer", "orderer"];

fn validate_signature_policy(expr: &str) -> Result<()> {
    let mut parser = PolicyParser { input: expr, pos: 0 };
    parser
        .expression()
        .and_then(|()| {
            parser.skip_whitespace();
            if parser.pos == expr.len() {
                Ok(())
            } else {
                Err(format!("trailing input at {}", parser.pos))
            }
        })
        .map_err(|reason| SdkError::InvalidArgument(format!("invalid signature policy {}: {}", expr, reason)))
}

/// Recursive descent over `GATE(args...)` and `'<msp>.<role>'` principals
struct PolicyParser<'a> {
    input: &'a str,
    pos: usize,
}

impl PolicyParser<'_> {
    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn expect(&mut self, c: char) -> std::result::Result<(), String> {
        self.skip_whitespace();
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(format!("expected '{}' at {}", c, self.pos))
        }
    }

    fn expression(&mut self) -> std::result::Result<(), String> {
        self.skip_whitespace();
        match self.rest().chars().next() {
            Some('\'') | Some('"') => self.principal(),
            Some(_) => self.gate(),
            None => Err("unexpected end of policy".into()),
        }
    }

    fn gate(&mut self) -> std::result::Result<(), String> {
        let name_len = self.rest().find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(self.rest().len());
        let name = self.rest()[..name_len].to_ascii_lowercase();
        self.pos += name_len;
        self.expect('(')?;

        let required = match name.as_str() {
            "and" | "or" => None,
            "outof" => {
                self.skip_whitespace();
                let digits = self.rest().find(|c: char| !c.is_ascii_digit()).unwrap_or(self.rest().len());
                let n: usize = self.rest()[..digits]
                    .parse()
                    .map_err(|_| format!("OutOf needs a count at {}", self.pos))?;
                self.pos += digits;
                self.expect(',')?;
                Some(n)
            }
            _ => return Err(format!("unknown gate '{}'", name)),
        };

        let mut operands = 0;
        loop {
            self.expression()?;
            operands += 1;
            self.skip_whitespace();
            if self.rest().starts_with(',') {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.expect(')')?;

        match required {
            Some(n) if n == 0 || n > operands => Err(format!("OutOf({}) over {} operands", n, operands)),
            _ => Ok(()),
        }
    }

    fn principal(&mut self) -> std::result::Result<(), String> {
        let quote = self.rest().chars().next().unwrap_or('\'');
        self.pos += 1;
        let len = self
            .rest()
            .find(quote)
            .ok_or_else(|| format!("unterminated principal at {}", self.pos))?;
        let input = self.input;
        let principal = &input[self.pos..self.pos + len];
        self.pos += len + 1;

        let (msp, role) = principal
            .rsplit_once('.')
            .ok_or_else(|| format!("principal '{}' is not <msp>.<role>", principal))?;
        if msp.is_empty() {
            return Err(format!("principal '{}' has no msp id", principal));
        }
        if !POLICY_ROLES.contains(&role.to_ascii_lowercase().as_str()) {
            return Err(format!("unknown role '{}' in principal '{}'", role, principal));
        }
        Ok(())
    }
}

/// Parse private data collection definitions from their JSON form
pub fn collections_from_json(json: &str) -> Result<CollectionConfigPackage> {
    let config: Vec<CollectionConfig> = serde_json::from_str(json)?;
    for collection in &config {
        if collection.name.is_empty() {
            return Err(SdkError::InvalidArgument("collection name is required".into()));
        }
        if collection.max_peer_count < collection.required_peer_count {
            return Err(SdkError::InvalidArgument(format!(
                "collection {}: max peer count {} is lower than required peer count {}",
                collection.name, collection.max_peer_count, collection.required_peer_count
            )));
        }
        if let Some(ApplicationPolicy::SignaturePolicy(expr)) = &collection.endorsement_policy {
            validate_signature_policy(expr)?;
        }
    }
    Ok(CollectionConfigPackage { config })
}

/// Parse transient data given as a JSON object of base64 values
pub fn parse_transient(json: &str) -> Result<BTreeMap<String, Vec<u8>>> {
    let raw: BTreeMap<String, String> = serde_json::from_str(json)?;
    raw.into_iter()
        .map(|(key, value)| {
            BASE64
                .decode(value.as_bytes())
                .map(|bytes| (key.clone(), bytes))
                .map_err(|e| SdkError::InvalidArgument(format!("transient field {}: {}", key, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Ed25519Signer;
    use fabric_protos::{decode, SignatureHeader};

    fn definition() -> ChaincodeDefinition {
        ChaincodeDefinition::new("basic", "1.0", 1)
    }

    #[test]
    fn test_both_policies_rejected() {
        let signer = Ed25519Signer::generate("Org1MSP");
        let kind = ProposalKind::Approve {
            definition: definition()
                .with_signature_policy("OR('Org1MSP.member')")
                .with_channel_config_policy("/Channel/Application/Endorsement"),
            package_id: None,
        };

        let err = ProposalBuilder::new(&signer).channel("mychannel").build(&kind).unwrap_err();
        assert!(matches!(err, SdkError::InvalidArgument(_)));
    }

    #[test]
    fn test_policy_encoding() {
        assert!(application_policy(None, None).unwrap().is_empty());
        assert!(application_policy(Some("OR('Org1MSP.member','Org2MSP.member')"), None).is_ok());
        assert!(application_policy(Some("OR('Org1MSP.member'"), None).is_err());
        assert!(application_policy(Some("member"), None).is_err());
        assert!(application_policy(Some("OutOf(2, 'Org1MSP.peer', AND('Org2MSP.admin', \"Org3MSP.client\"))"), None).is_ok());

        let bytes = application_policy(None, Some("/Channel/Application/Endorsement")).unwrap();
        let policy: ApplicationPolicy = decode(&bytes).unwrap();
        assert_eq!(
            policy,
            ApplicationPolicy::ChannelConfigPolicyReference("/Channel/Application/Endorsement".into())
        );
    }

    #[test]
    fn test_malformed_principals_rejected() {
        for expr in [
            "OR('Org1MSP')",
            "OR('Org1MSP.superuser')",
            "OR('.member')",
            "OR('Org1MSP.member",
            "XOR('Org1MSP.member')",
            "OutOf(3, 'Org1MSP.member', 'Org2MSP.member')",
            "OR('Org1MSP.member') extra",
            "OR()",
        ] {
            assert!(
                matches!(application_policy(Some(expr), None), Err(SdkError::InvalidArgument(_))),
                "{} should be rejected",
                expr
            );
        }
    }

    #[test]
    fn test_tx_id_matches_header() {
        let signer = Ed25519Signer::generate("Org1MSP");
        let kind = ProposalKind::Invoke(Invocation::new("basic", vec![b"put".to_vec(), b"k".to_vec()]));
        let (proposal, tx_id) = ProposalBuilder::new(&signer).channel("mychannel").build(&kind).unwrap();

        let header: Header = decode(&proposal.header).unwrap();
        let channel_header: ChannelHeader = decode(&header.channel_header).unwrap();
        let signature_header: SignatureHeader = decode(&header.signature_header).unwrap();

        assert_eq!(channel_header.tx_id, tx_id);
        assert_eq!(channel_header.channel_id, "mychannel");
        assert_eq!(channel_header.header_type, HeaderType::EndorserTransaction);
        assert_eq!(signature_header.creator, signer.serialize());
        assert_eq!(tx_id, compute_tx_id(&signature_header.nonce, &signature_header.creator));
    }

    #[test]
    fn test_channel_required_for_channel_scoped_kinds() {
        let signer = Ed25519Signer::generate("Org1MSP");
        let builder = ProposalBuilder::new(&signer);

        assert!(builder.build(&ProposalKind::ListChannels).is_ok());
        assert!(builder.build(&ProposalKind::QueryInstalled).is_ok());
        assert!(matches!(
            builder.build(&ProposalKind::Commit { definition: definition() }),
            Err(SdkError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_join_uses_config_header() {
        let signer = Ed25519Signer::generate("Org1MSP");
        let kind = ProposalKind::JoinChannel {
            genesis_block: vec![1, 2, 3],
        };
        let (proposal, _) = ProposalBuilder::new(&signer).build(&kind).unwrap();

        let header: Header = decode(&proposal.header).unwrap();
        let channel_header: ChannelHeader = decode(&header.channel_header).unwrap();
        assert_eq!(channel_header.header_type, HeaderType::Config);
        assert!(channel_header.channel_id.is_empty());

        let payload: ChaincodeProposalPayload = decode(&proposal.payload).unwrap();
        let cis: ChaincodeInvocationSpec = decode(&payload.input).unwrap();
        assert_eq!(cis.chaincode_spec.chaincode_id.name, CSCC);
        assert_eq!(cis.chaincode_spec.input.args[0], JOIN_CHAIN_FUNC.as_bytes());
    }

    #[test]
    fn test_transient_parsing() {
        let map = parse_transient(r#"{"asset":"c2VjcmV0"}"#).unwrap();
        assert_eq!(map["asset"], b"secret");
        assert!(parse_transient(r#"{"asset":"***"}"#).is_err());
        assert!(parse_transient("not json").is_err());
    }

    #[test]
    fn test_collections_from_json() {
        let json = r#"[{"name":"pdc","policy":"OR('Org1MSP.member')","requiredPeerCount":2,"maxPeerCount":1}]"#;
        assert!(collections_from_json(json).is_err());

        let json = r#"[{"name":"pdc","policy":"OR('Org1MSP.member')","requiredPeerCount":0,"maxPeerCount":3}]"#;
        assert_eq!(collections_from_json(json).unwrap().config.len(), 1);
    }
}
