//! Chaincode lifecycle: install, approve, commit and the matching queries

use crate::endorser::{endorse_one, Endorser};
use crate::error::{Result, SdkError};
use crate::proposal::{ChaincodeDefinition, ProposalBuilder, ProposalKind};
use crate::signer::{sign_proposal, Signer};
use crate::transaction::{endorse, submit_endorsed, EndorsedProposal, Endpoints, TxResponse};
use fabric_protos::lifecycle::{
    ChaincodeDefinition as CommittedDefinition, CheckCommitReadinessResult, InstallChaincodeResult,
    InstalledChaincode, QueryApprovedChaincodeDefinitionResult, QueryChaincodeDefinitionResult,
    QueryChaincodeDefinitionsResult, QueryInstalledChaincodesResult,
};
use fabric_protos::{decode, ChaincodeLang, Response, STATUS_INTERNAL_ERROR, STATUS_OK, STATUS_PARTIAL};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Turns chaincode sources of one language into an installable package
pub trait Platform: Send + Sync {
    /// Language this platform packages; used as the registry key
    fn lang(&self) -> ChaincodeLang;

    /// Build the install package for the sources at `path`
    fn package(&self, path: &Path, label: &str) -> Result<Vec<u8>>;
}

/// Platforms available to a source installer, keyed by language
#[derive(Default, Clone)]
pub struct PlatformRegistry {
    platforms: HashMap<ChaincodeLang, Arc<dyn Platform>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a platform, replacing any earlier one for the same language
    pub fn register(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platforms.insert(platform.lang(), platform);
        self
    }

    /// Platform for `lang`; unregistered languages are an invalid argument
    pub fn get(&self, lang: ChaincodeLang) -> Result<&Arc<dyn Platform>> {
        self.platforms
            .get(&lang)
            .ok_or_else(|| SdkError::InvalidArgument(format!("no platform registered for {:?}", lang)))
    }
}

/// Where the install package comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChaincodeInstaller {
    PackageBytes(Vec<u8>),
    PackageFile(PathBuf),
    Source {
        path: PathBuf,
        label: String,
        lang: ChaincodeLang,
    },
}

impl ChaincodeInstaller {
    /// Package bytes to send to peers, read or built as the variant says
    pub fn package(&self, registry: &PlatformRegistry) -> Result<Vec<u8>> {
        match self {
            ChaincodeInstaller::PackageBytes(bytes) => Ok(bytes.clone()),
            ChaincodeInstaller::PackageFile(path) => Ok(std::fs::read(path)?),
            ChaincodeInstaller::Source { path, label, lang } => registry.get(*lang)?.package(path, label),
        }
    }
}

/// Install outcome on one peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInstallResult {
    pub address: String,
    pub status: i32,
    pub message: String,
}

/// Install outcome across peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResponse {
    /// 200 when every peer installed, 204 when some did, 500 when none did
    pub status: i32,
    pub package_id: String,
    pub label: String,
    pub results: Vec<PeerInstallResult>,
}

/// Install a chaincode package on every peer
///
/// Per-peer failures are reported in the results instead of failing the call.
pub async fn install(
    signer: &dyn Signer,
    peers: &[Arc<dyn Endorser>],
    installer: &ChaincodeInstaller,
    registry: &PlatformRegistry,
    timeout: Duration,
) -> Result<InstallResponse> {
    let package = installer.package(registry)?;
    let (proposal, _) = ProposalBuilder::new(signer).build(&ProposalKind::Install { package })?;
    let signed = sign_proposal(&proposal, signer)?;

    let mut response = InstallResponse {
        status: STATUS_OK,
        package_id: String::new(),
        label: String::new(),
        results: Vec::with_capacity(peers.len()),
    };
    let mut installed = 0;

    for peer in peers {
        let address = peer.address().to_string();
        let result = match endorse_one(&signed, peer.as_ref(), timeout).await {
            Ok(proposal_response) => {
                let reply = proposal_response.response;
                if reply.status == STATUS_OK {
                    match decode::<InstallChaincodeResult>(&reply.payload) {
                        Ok(result) => {
                            installed += 1;
                            if response.package_id.is_empty() {
                                response.package_id = result.package_id;
                            }
                            if response.label.is_empty() {
                                response.label = result.label;
                            }
                            PeerInstallResult {
                                address,
                                status: reply.status,
                                message: reply.message,
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Undecodable install result from {}: {}", address, e);
                            PeerInstallResult {
                                address,
                                status: STATUS_INTERNAL_ERROR,
                                message: e.to_string(),
                            }
                        }
                    }
                } else {
                    PeerInstallResult {
                        address,
                        status: reply.status,
                        message: reply.message,
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Install on {} failed: {}", address, e);
                PeerInstallResult {
                    address,
                    status: STATUS_INTERNAL_ERROR,
                    message: e.to_string(),
                }
            }
        };
        response.results.push(result);
    }

    response.status = if installed == peers.len() {
        STATUS_OK
    } else if installed > 0 {
        STATUS_PARTIAL
    } else {
        STATUS_INTERNAL_ERROR
    };
    tracing::info!(
        "Installed package {} on {}/{} peers",
        response.package_id,
        installed,
        peers.len()
    );
    Ok(response)
}

/// Approve a chaincode definition for the signer's organization
///
/// Endorsed by the committer only, then ordered.
pub async fn approve(
    signer: &Arc<dyn Signer>,
    endpoints: &Endpoints,
    channel_id: &str,
    definition: ChaincodeDefinition,
    package_id: Option<String>,
    wait: Option<Duration>,
) -> Result<TxResponse> {
    let kind = ProposalKind::Approve { definition, package_id };
    let (proposal, tx_id) = ProposalBuilder::new(signer.as_ref()).channel(channel_id).build(&kind)?;
    let signed = sign_proposal(&proposal, signer.as_ref())?;

    let committer = endpoints.committer()?;
    let proposal_response = endorse_one(&signed, committer.as_ref(), endpoints.timeouts.endorse()).await?;
    require_ok(&proposal_response.response)?;

    let response = proposal_response.response.clone();
    let endorsed = EndorsedProposal {
        tx_id: tx_id.clone(),
        proposal,
        responses: vec![proposal_response],
    };
    submit_endorsed(signer, endpoints, channel_id, &endorsed, wait).await?;
    tracing::info!("Chaincode definition approved in {}", tx_id);
    Ok(TxResponse { tx_id, response })
}

/// Commit a chaincode definition once enough organizations approved it
pub async fn commit(
    signer: &Arc<dyn Signer>,
    endpoints: &Endpoints,
    channel_id: &str,
    definition: ChaincodeDefinition,
    wait: Option<Duration>,
) -> Result<TxResponse> {
    let kind = ProposalKind::Commit { definition };
    let endorsed = endorse(signer.as_ref(), endpoints, channel_id, &kind).await?;
    for proposal_response in &endorsed.responses {
        require_ok(&proposal_response.response)?;
    }

    submit_endorsed(signer, endpoints, channel_id, &endorsed, wait).await?;
    tracing::info!("Chaincode definition committed in {}", endorsed.tx_id);
    Ok(TxResponse {
        tx_id: endorsed.tx_id.clone(),
        response: endorsed.responses[0].response.clone(),
    })
}

/// Committed chaincode definitions on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommittedChaincodes {
    Single(QueryChaincodeDefinitionResult),
    All(Vec<CommittedDefinition>),
}

/// Chaincode packages installed on `peer`
pub async fn query_installed(signer: &dyn Signer, peer: &dyn Endorser, timeout: Duration) -> Result<Vec<InstalledChaincode>> {
    let response = query_peer(signer, peer, "", &ProposalKind::QueryInstalled, timeout).await?;
    let result: QueryInstalledChaincodesResult = decode(&response.payload)?;
    Ok(result.installed_chaincodes)
}

/// Definition the peer's organization approved for `name` at `sequence`
pub async fn query_approved(
    signer: &dyn Signer,
    peer: &dyn Endorser,
    channel_id: &str,
    name: &str,
    sequence: i64,
    timeout: Duration,
) -> Result<QueryApprovedChaincodeDefinitionResult> {
    let kind = ProposalKind::QueryApproved {
        name: name.to_string(),
        sequence,
    };
    let response = query_peer(signer, peer, channel_id, &kind, timeout).await?;
    Ok(decode(&response.payload)?)
}

/// One definition when `name` is given, every committed definition otherwise
pub async fn query_committed(
    signer: &dyn Signer,
    peer: &dyn Endorser,
    channel_id: &str,
    name: Option<&str>,
    timeout: Duration,
) -> Result<CommittedChaincodes> {
    let kind = ProposalKind::QueryCommitted {
        name: name.map(str::to_string),
    };
    let response = query_peer(signer, peer, channel_id, &kind, timeout).await?;
    match name {
        Some(_) => Ok(CommittedChaincodes::Single(decode(&response.payload)?)),
        None => {
            let result: QueryChaincodeDefinitionsResult = decode(&response.payload)?;
            Ok(CommittedChaincodes::All(result.chaincode_definitions))
        }
    }
}

/// Approval state of each organization for a definition
pub async fn check_commit_readiness(
    signer: &dyn Signer,
    peer: &dyn Endorser,
    channel_id: &str,
    definition: ChaincodeDefinition,
    timeout: Duration,
) -> Result<BTreeMap<String, bool>> {
    let kind = ProposalKind::CheckCommitReadiness { definition };
    let response = query_peer(signer, peer, channel_id, &kind, timeout).await?;
    let result: CheckCommitReadinessResult = decode(&response.payload)?;
    Ok(result.approvals)
}

/// Send a proposal to one peer and require a 200 response
pub(crate) async fn query_peer(
    signer: &dyn Signer,
    peer: &dyn Endorser,
    channel_id: &str,
    kind: &ProposalKind,
    timeout: Duration,
) -> Result<Response> {
    let (proposal, _) = ProposalBuilder::new(signer).channel(channel_id).build(kind)?;
    let signed = sign_proposal(&proposal, signer)?;
    let proposal_response = endorse_one(&signed, peer, timeout).await?;
    require_ok(&proposal_response.response)?;
    Ok(proposal_response.response)
}

fn require_ok(response: &Response) -> Result<()> {
    if response.status != STATUS_OK {
        return Err(SdkError::EndorsementFailed {
            status: response.status,
            message: response.message.clone(),
        });
    }
    Ok(())
}
