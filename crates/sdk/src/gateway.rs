//! Application facing API
//!
//! Every call returns the same `{status, message, payload}` shape. Endorser
//! verdicts land in the status; failures before a verdict exists are errors.

use crate::channel::{self, ChannelSource};
use crate::config::SdkConfig;
use crate::config_update::{
    self, ConfigChange, ConfigDeltaComputer, ProposalEnvelope, ProposalSignature, WriteSetComputer,
};
use crate::deliver::DeliverClient;
use crate::endorser::Endorser;
use crate::error::{Result, SdkError};
use crate::lifecycle::{self, ChaincodeInstaller, PlatformRegistry};
use crate::proposal::{ChaincodeDefinition, Invocation, ProposalKind};
use crate::signer::Signer;
use crate::transaction::{self, Endpoints};
use crate::transport::{WsDeliverClient, WsEndorser, WsOrderer};
use fabric_protos::{decode, encode, Envelope, Response, STATUS_OK};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Uniform result of a gateway call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub status: i32,
    pub message: String,
    pub payload: Vec<u8>,
}

impl GatewayResponse {
    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            status: STATUS_OK,
            message: String::new(),
            payload,
        }
    }

    pub fn is_success(&self) -> bool {
        crate::assembler::is_success(self.status)
    }
}

impl From<Response> for GatewayResponse {
    fn from(response: Response) -> Self {
        Self {
            status: response.status,
            message: response.message,
            payload: response.payload,
        }
    }
}

/// Client bound to one identity and one set of nodes
pub struct Gateway {
    signer: Arc<dyn Signer>,
    endpoints: Endpoints,
    platforms: PlatformRegistry,
    delta_computer: Arc<dyn ConfigDeltaComputer>,
}

impl Gateway {
    pub fn new(signer: Arc<dyn Signer>, endpoints: Endpoints) -> Self {
        Self {
            signer,
            endpoints,
            platforms: PlatformRegistry::new(),
            delta_computer: Arc::new(WriteSetComputer),
        }
    }

    /// WebSocket handles for every node in `config`
    ///
    /// No connection is made until a call needs one.
    pub fn connect(config: &SdkConfig, signer: Arc<dyn Signer>) -> Result<Self> {
        if config.peers.is_empty() {
            return Err(SdkError::InvalidArgument("at least one peer is required".into()));
        }
        let connect = config.timeouts.connect();
        let endorsers: Vec<Arc<dyn Endorser>> = config
            .peers
            .iter()
            .map(|peer| Arc::new(WsEndorser::new(peer.address.clone(), connect)) as Arc<dyn Endorser>)
            .collect();

        // Commit is confirmed on every configured peer
        let delivers: Vec<Arc<dyn DeliverClient>> = config
            .peers
            .iter()
            .map(|peer| Arc::new(WsDeliverClient::new(peer.address.clone(), connect)) as Arc<dyn DeliverClient>)
            .collect();

        let mut endpoints = Endpoints::new(Arc::new(WsOrderer::new(config.orderer.address.clone(), connect)))
            .with_endorsers(endorsers)
            .with_delivers(delivers)
            .with_timeouts(config.timeouts);
        if let Some(address) = config.committer_address() {
            endpoints = endpoints.with_committer(Arc::new(WsEndorser::new(address, connect)));
        }

        tracing::info!(
            "Gateway for {} using orderer {} and {} peers",
            signer.org_id(),
            config.orderer.address,
            config.peers.len()
        );
        Ok(Self::new(signer, endpoints))
    }

    /// Platforms used to package chaincode from source
    pub fn with_platforms(mut self, platforms: PlatformRegistry) -> Self {
        self.platforms = platforms;
        self
    }

    /// Delta computation used by [`proposal_initiate`](Self::proposal_initiate)
    pub fn with_delta_computer(mut self, computer: Arc<dyn ConfigDeltaComputer>) -> Self {
        self.delta_computer = computer;
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn signer(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    /// Install on every peer; the payload is the JSON install report
    pub async fn install_chaincode(&self, installer: &ChaincodeInstaller) -> Result<GatewayResponse> {
        let result = lifecycle::install(
            self.signer.as_ref(),
            &self.endpoints.endorsers,
            installer,
            &self.platforms,
            self.endpoints.timeouts.endorse(),
        )
        .await?;
        Ok(GatewayResponse {
            status: result.status,
            message: result.package_id.clone(),
            payload: serde_json::to_vec(&result)?,
        })
    }

    pub async fn approve_chaincode(
        &self,
        channel_id: &str,
        definition: ChaincodeDefinition,
        package_id: Option<String>,
    ) -> Result<GatewayResponse> {
        let wait = self.endpoints.timeouts.commit();
        let result =
            lifecycle::approve(&self.signer, &self.endpoints, channel_id, definition, package_id, wait).await?;
        Ok(tx_response(result))
    }

    pub async fn commit_chaincode(&self, channel_id: &str, definition: ChaincodeDefinition) -> Result<GatewayResponse> {
        let wait = self.endpoints.timeouts.commit();
        let result = lifecycle::commit(&self.signer, &self.endpoints, channel_id, definition, wait).await?;
        Ok(tx_response(result))
    }

    /// Endorse and order, waiting for commit when a commit timeout is configured
    pub async fn invoke(&self, channel_id: &str, invocation: Invocation) -> Result<GatewayResponse> {
        let wait = self.endpoints.timeouts.commit();
        let kind = ProposalKind::Invoke(invocation);
        let result = transaction::invoke(&self.signer, &self.endpoints, channel_id, &kind, wait).await?;
        Ok(tx_response(result))
    }

    pub async fn query(&self, channel_id: &str, invocation: Invocation) -> Result<GatewayResponse> {
        let kind = ProposalKind::Query(invocation);
        let result = transaction::query(self.signer.as_ref(), &self.endpoints, channel_id, &kind).await?;
        Ok(result.response.into())
    }

    pub async fn create_channel(&self, channel_id: &str, source: &ChannelSource) -> Result<GatewayResponse> {
        channel::create(
            self.endpoints.orderer.as_ref(),
            self.signer.as_ref(),
            channel_id,
            source,
            self.endpoints.timeouts.broadcast(),
        )
        .await?;
        Ok(GatewayResponse::ok(Vec::new()))
    }

    /// Join every peer; the first peer that did not answer 200 decides the outcome
    pub async fn join_channel(&self, channel_id: &str) -> Result<GatewayResponse> {
        let responses = channel::join(
            self.endpoints.orderer.as_ref(),
            self.signer.as_ref(),
            &self.endpoints.endorsers,
            channel_id,
            self.endpoints.timeouts.endorse(),
        )
        .await?;
        match responses.into_iter().find(|response| response.status != STATUS_OK) {
            Some(failed) => Ok(failed.into()),
            None => Ok(GatewayResponse::ok(Vec::new())),
        }
    }

    /// Sign and submit an encoded config update envelope
    pub async fn update_channel(&self, channel_id: &str, envelope: &[u8]) -> Result<GatewayResponse> {
        let envelope: Envelope = decode(envelope)?;
        channel::update(
            self.endpoints.orderer.as_ref(),
            self.signer.as_ref(),
            channel_id,
            &envelope,
            self.endpoints.timeouts.broadcast(),
        )
        .await?;
        Ok(GatewayResponse::ok(Vec::new()))
    }

    /// Channels joined by the committing peer, as a JSON array
    pub async fn list_channels(&self) -> Result<GatewayResponse> {
        let peer = self.endpoints.committer()?;
        let channels =
            channel::list_channels(self.signer.as_ref(), peer.as_ref(), self.endpoints.timeouts.endorse()).await?;
        Ok(GatewayResponse::ok(serde_json::to_vec(&channels)?))
    }

    /// Encoded block `number`, or the newest one
    pub async fn fetch_block(&self, channel_id: &str, number: Option<u64>) -> Result<GatewayResponse> {
        let block = channel::fetch_block(
            self.endpoints.orderer.as_ref(),
            self.signer.as_ref(),
            channel_id,
            number,
            self.endpoints.tls_cert_hash.clone(),
            self.endpoints.timeouts.broadcast(),
        )
        .await?;
        Ok(GatewayResponse::ok(encode(&block)))
    }

    /// Encoded `ConfigEnvelope` of the channel
    pub async fn fetch_config(&self, channel_id: &str) -> Result<GatewayResponse> {
        let config = channel::fetch_config(
            self.endpoints.orderer.as_ref(),
            self.signer.as_ref(),
            channel_id,
            self.endpoints.tls_cert_hash.clone(),
            self.endpoints.timeouts.broadcast(),
        )
        .await?;
        Ok(GatewayResponse::ok(encode(&config)))
    }

    /// Start a membership change as sponsor; the payload is the JSON proposal to hand to other organizations
    pub async fn proposal_initiate(&self, channel_id: &str, change: &ConfigChange) -> Result<GatewayResponse> {
        let proposal = config_update::initiate(
            self.endpoints.orderer.as_ref(),
            self.signer.as_ref(),
            channel_id,
            change,
            self.delta_computer.as_ref(),
            self.endpoints.timeouts.broadcast(),
        )
        .await?;
        Ok(GatewayResponse::ok(serde_json::to_vec(&proposal)?))
    }

    /// Sign a proposal received from its sponsor; the payload is the JSON signature
    pub fn proposal_sign(&self, proposal: &ProposalEnvelope) -> Result<GatewayResponse> {
        let signature = config_update::sign_proposal(self.signer.as_ref(), proposal)?;
        Ok(GatewayResponse {
            status: STATUS_OK,
            message: signature.creator.clone(),
            payload: serde_json::to_vec(&signature)?,
        })
    }

    /// Merge collected signatures and order the update; only the sponsor may call this
    pub async fn proposal_submit(
        &self,
        proposal: &ProposalEnvelope,
        signatures: &[ProposalSignature],
    ) -> Result<GatewayResponse> {
        config_update::submit(
            self.endpoints.orderer.as_ref(),
            self.signer.as_ref(),
            proposal,
            signatures,
            self.endpoints.timeouts.broadcast(),
        )
        .await?;
        Ok(GatewayResponse::ok(Vec::new()))
    }
}

/// Successful transactions report their id as the message
fn tx_response(result: transaction::TxResponse) -> GatewayResponse {
    let mut response = GatewayResponse::from(result.response);
    if response.is_success() {
        response.message = result.tx_id;
    }
    response
}
