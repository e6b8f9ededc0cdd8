//! Endorse, order and confirm
//!
//! [`Endpoints`] bundles the node handles one operation talks to. The
//! functions here drive a proposal through the full pipeline: endorsement
//! fan-out, assembly, broadcast, and optionally commit confirmation through a
//! [`DeliverGroup`] that subscribes before the envelope is sent.

use crate::assembler::create_signed_tx;
use crate::broadcast::{broadcast_envelope, OrdererClient};
use crate::config::Timeouts;
use crate::deliver::{DeliverClient, DeliverGroup};
use crate::endorser::{collect_endorsements, Endorser};
use crate::error::{Result, SdkError};
use crate::proposal::{ProposalBuilder, ProposalKind};
use crate::signer::{sign_proposal, Signer};
use fabric_protos::{Proposal, ProposalResponse, Response, STATUS_ERROR_THRESHOLD};
use std::sync::Arc;
use std::time::Duration;

/// Node handles used by a single operation
#[derive(Clone)]
pub struct Endpoints {
    pub orderer: Arc<dyn OrdererClient>,
    pub endorsers: Vec<Arc<dyn Endorser>>,
    /// Peers whose commit is awaited
    pub delivers: Vec<Arc<dyn DeliverClient>>,
    /// Peer answering lifecycle queries
    pub committer: Option<Arc<dyn Endorser>>,
    /// Hash of the client TLS certificate bound into seek requests
    pub tls_cert_hash: Option<Vec<u8>>,
    pub timeouts: Timeouts,
}

impl Endpoints {
    pub fn new(orderer: Arc<dyn OrdererClient>) -> Self {
        Self {
            orderer,
            endorsers: Vec::new(),
            delivers: Vec::new(),
            committer: None,
            tls_cert_hash: None,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_endorsers(mut self, endorsers: Vec<Arc<dyn Endorser>>) -> Self {
        self.endorsers = endorsers;
        self
    }

    pub fn with_delivers(mut self, delivers: Vec<Arc<dyn DeliverClient>>) -> Self {
        self.delivers = delivers;
        self
    }

    pub fn with_committer(mut self, committer: Arc<dyn Endorser>) -> Self {
        self.committer = Some(committer);
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Committer, falling back to the first endorser
    pub fn committer(&self) -> Result<Arc<dyn Endorser>> {
        self.committer
            .clone()
            .or_else(|| self.endorsers.first().cloned())
            .ok_or_else(|| SdkError::InvalidArgument("no committing peer configured".into()))
    }
}

/// Outcome of a transaction-producing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResponse {
    pub tx_id: String,
    /// Response of the first endorser
    pub response: Response,
}

/// Endorsed but not yet ordered transaction
#[derive(Debug, Clone)]
pub struct EndorsedProposal {
    pub tx_id: String,
    pub proposal: Proposal,
    pub responses: Vec<ProposalResponse>,
}

/// Build, sign and fan a proposal out to every endorser
pub async fn endorse(
    signer: &dyn Signer,
    endpoints: &Endpoints,
    channel_id: &str,
    kind: &ProposalKind,
) -> Result<EndorsedProposal> {
    let (proposal, tx_id) = ProposalBuilder::new(signer).channel(channel_id).build(kind)?;
    let signed = sign_proposal(&proposal, signer)?;
    let responses = collect_endorsements(&signed, &endpoints.endorsers, endpoints.timeouts.endorse()).await?;
    if responses.is_empty() {
        return Err(SdkError::NoResponses);
    }
    tracing::debug!("Collected {} endorsements for {}", responses.len(), tx_id);
    Ok(EndorsedProposal {
        tx_id,
        proposal,
        responses,
    })
}

/// Assemble an endorsed proposal and send it to the ordering service
///
/// With `wait` set, commit is awaited on every deliver peer; the subscription
/// is opened before broadcasting so the block cannot be missed.
pub async fn submit_endorsed(
    signer: &Arc<dyn Signer>,
    endpoints: &Endpoints,
    channel_id: &str,
    endorsed: &EndorsedProposal,
    wait: Option<Duration>,
) -> Result<()> {
    let envelope = create_signed_tx(&endorsed.proposal, signer.as_ref(), &endorsed.responses)?;

    let group = match wait {
        Some(timeout) if !endpoints.delivers.is_empty() => {
            let mut group = DeliverGroup::new(
                endpoints.delivers.clone(),
                signer.clone(),
                channel_id,
                endorsed.tx_id.clone(),
            );
            if let Some(hash) = &endpoints.tls_cert_hash {
                group = group.with_tls_cert_hash(hash.clone());
            }
            group.connect(timeout).await?;
            Some((group, timeout))
        }
        _ => None,
    };

    broadcast_envelope(endpoints.orderer.as_ref(), &envelope, endpoints.timeouts.broadcast()).await?;
    tracing::info!("Transaction {} sent to orderer", endorsed.tx_id);

    if let Some((mut group, timeout)) = group {
        group.wait(timeout).await?;
    }
    Ok(())
}

/// Endorse and, when every endorser succeeded, order a transaction
///
/// The first endorser status at or above the error threshold is returned as
/// the response without ordering anything.
pub async fn invoke(
    signer: &Arc<dyn Signer>,
    endpoints: &Endpoints,
    channel_id: &str,
    kind: &ProposalKind,
    wait: Option<Duration>,
) -> Result<TxResponse> {
    let endorsed = endorse(signer.as_ref(), endpoints, channel_id, kind).await?;
    let rejected = endorsed
        .responses
        .iter()
        .find(|r| r.response.status >= STATUS_ERROR_THRESHOLD);
    if let Some(rejected) = rejected {
        tracing::warn!(
            "Transaction {} rejected by endorser with status {}: {}",
            endorsed.tx_id,
            rejected.response.status,
            rejected.response.message
        );
        return Ok(TxResponse {
            tx_id: endorsed.tx_id.clone(),
            response: rejected.response.clone(),
        });
    }

    submit_endorsed(signer, endpoints, channel_id, &endorsed, wait).await?;
    Ok(TxResponse {
        tx_id: endorsed.tx_id.clone(),
        response: endorsed.responses[0].response.clone(),
    })
}

/// Endorse only; the first endorser's response is the query result
pub async fn query(signer: &dyn Signer, endpoints: &Endpoints, channel_id: &str, kind: &ProposalKind) -> Result<TxResponse> {
    let endorsed = endorse(signer, endpoints, channel_id, kind).await?;
    Ok(TxResponse {
        tx_id: endorsed.tx_id,
        response: endorsed.responses[0].response.clone(),
    })
}
