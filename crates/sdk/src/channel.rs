//! Channel creation, membership of peers and channel queries

use crate::block::{config_from_block, BlockFetcher};
use crate::broadcast::{broadcast_envelope, OrdererClient};
use crate::config_update::{sanity_check_and_sign_config_tx, ConfigUpdateEnvelope};
use crate::endorser::{endorse_one, Endorser};
use crate::error::{Result, SdkError};
use crate::lifecycle::query_peer;
use crate::organization::{application_channel_policies, APPLICATION_CAPABILITY};
use crate::proposal::{ProposalBuilder, ProposalKind};
use crate::signer::{sign_proposal, Signer};
use fabric_protos::config::{ApplicationGroup, ChannelGroup, ConfigEnvelope, ConfigUpdate, Organization};
use fabric_protos::{
    decode, encode, Block, BlockchainInfo, ChannelQueryResponse, Envelope, Response, STATUS_INTERNAL_ERROR,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Where a channel creation transaction comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelSource {
    /// Encoded `CONFIG_UPDATE` envelope
    EnvelopeBytes(Vec<u8>),
    /// File holding an encoded `CONFIG_UPDATE` envelope
    EnvelopeFile(PathBuf),
    /// Application channel for the given consortium members
    Application {
        consortium: String,
        organizations: Vec<Organization>,
    },
}

impl ChannelSource {
    /// Unsigned config update envelope for `channel_id`
    pub fn envelope(&self, channel_id: &str) -> Result<Envelope> {
        match self {
            ChannelSource::EnvelopeBytes(bytes) => Ok(decode(bytes)?),
            ChannelSource::EnvelopeFile(path) => Ok(decode(&std::fs::read(path)?)?),
            ChannelSource::Application {
                consortium,
                organizations,
            } => {
                let update = application_channel_update(channel_id, consortium, organizations)?;
                Ok(ConfigUpdateEnvelope::new(channel_id, encode(&update)).create_envelope())
            }
        }
    }
}

/// Config update that creates an application channel in `consortium`
pub fn application_channel_update(
    channel_id: &str,
    consortium: &str,
    organizations: &[Organization],
) -> Result<ConfigUpdate> {
    if organizations.is_empty() {
        return Err(SdkError::InvalidArgument("a channel needs at least one organization".into()));
    }

    // Members are referenced by name only; their definitions live in the consortium
    let members: BTreeMap<String, Organization> = organizations
        .iter()
        .map(|org| {
            let mut reference = org.clone();
            reference.policies.clear();
            reference.root_certs.clear();
            reference.tls_root_certs.clear();
            reference.admin_certs.clear();
            (org.name.clone(), reference)
        })
        .collect();

    let read_set = ChannelGroup {
        consortium: Some(consortium.to_string()),
        application: Some(ApplicationGroup {
            organizations: members.clone(),
            ..Default::default()
        }),
        ..Default::default()
    };
    let write_set = ChannelGroup {
        consortium: Some(consortium.to_string()),
        application: Some(ApplicationGroup {
            organizations: members,
            capabilities: vec![APPLICATION_CAPABILITY.to_string()],
            policies: application_channel_policies(),
        }),
        ..Default::default()
    };

    Ok(ConfigUpdate {
        channel_id: channel_id.to_string(),
        read_sequence: 0,
        read_set,
        write_set,
    })
}

/// Sign a channel creation transaction and send it to the ordering service
pub async fn create(
    orderer: &dyn OrdererClient,
    signer: &dyn Signer,
    channel_id: &str,
    source: &ChannelSource,
    timeout: Duration,
) -> Result<()> {
    let envelope = source.envelope(channel_id)?;
    let signed = sanity_check_and_sign_config_tx(&envelope, signer, channel_id)?;
    broadcast_envelope(orderer, &signed, timeout).await?;
    tracing::info!("Channel {} creation submitted", channel_id);
    Ok(())
}

/// Sign a channel update envelope and send it to the ordering service
///
/// An empty `channel_id` takes the channel named by the envelope.
pub async fn update(
    orderer: &dyn OrdererClient,
    signer: &dyn Signer,
    channel_id: &str,
    envelope: &Envelope,
    timeout: Duration,
) -> Result<()> {
    let signed = sanity_check_and_sign_config_tx(envelope, signer, channel_id)?;
    broadcast_envelope(orderer, &signed, timeout).await?;
    tracing::info!("Channel update submitted");
    Ok(())
}

/// Join every peer to a channel using its genesis block from the orderer
///
/// One response per peer, in order. A peer that could not be reached gets a
/// 500 response whose payload is its address.
pub async fn join(
    orderer: &dyn OrdererClient,
    signer: &dyn Signer,
    peers: &[std::sync::Arc<dyn Endorser>],
    channel_id: &str,
    timeout: Duration,
) -> Result<Vec<Response>> {
    let genesis = BlockFetcher::new(orderer, signer, channel_id)
        .best_effort(true)
        .timeout(timeout)
        .get_specified_block(0)
        .await?;

    let kind = ProposalKind::JoinChannel {
        genesis_block: encode(&genesis),
    };
    let (proposal, _) = ProposalBuilder::new(signer).build(&kind)?;
    let signed = sign_proposal(&proposal, signer)?;

    let mut responses = Vec::with_capacity(peers.len());
    for peer in peers {
        match endorse_one(&signed, peer.as_ref(), timeout).await {
            Ok(proposal_response) => {
                tracing::info!(
                    "Peer {} answered join {} with {}",
                    peer.address(),
                    channel_id,
                    proposal_response.response.status
                );
                responses.push(proposal_response.response);
            }
            Err(e) => {
                tracing::warn!("Peer {} failed to join {}: {}", peer.address(), channel_id, e);
                responses.push(Response {
                    status: STATUS_INTERNAL_ERROR,
                    message: e.to_string(),
                    payload: peer.address().as_bytes().to_vec(),
                });
            }
        }
    }
    Ok(responses)
}

/// Channels the peer has joined
pub async fn list_channels(signer: &dyn Signer, peer: &dyn Endorser, timeout: Duration) -> Result<Vec<String>> {
    let response = query_peer(signer, peer, "", &ProposalKind::ListChannels, timeout).await?;
    let channels: ChannelQueryResponse = decode(&response.payload)?;
    Ok(channels.channels.into_iter().map(|info| info.channel_id).collect())
}

/// Height and tip hashes of the peer's copy of the ledger
pub async fn get_chain_info(
    signer: &dyn Signer,
    peer: &dyn Endorser,
    channel_id: &str,
    timeout: Duration,
) -> Result<BlockchainInfo> {
    let response = query_peer(signer, peer, channel_id, &ProposalKind::ChainInfo, timeout).await?;
    Ok(decode(&response.payload)?)
}

/// Block `number`, or the newest block when none is given
pub async fn fetch_block(
    orderer: &dyn OrdererClient,
    signer: &dyn Signer,
    channel_id: &str,
    number: Option<u64>,
    tls_cert_hash: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<Block> {
    let fetcher = BlockFetcher::new(orderer, signer, channel_id)
        .tls_cert_hash(tls_cert_hash)
        .timeout(timeout);
    match number {
        Some(number) => fetcher.get_specified_block(number).await,
        None => fetcher.get_newest_block().await,
    }
}

/// Current channel configuration
pub async fn fetch_config(
    orderer: &dyn OrdererClient,
    signer: &dyn Signer,
    channel_id: &str,
    tls_cert_hash: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<ConfigEnvelope> {
    let block = BlockFetcher::new(orderer, signer, channel_id)
        .tls_cert_hash(tls_cert_hash)
        .timeout(timeout)
        .get_config_block()
        .await?;
    config_from_block(&block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organization::OrganizationBuilder;
    use crate::signer::Ed25519Signer;
    use fabric_protos::{ChannelHeader, HeaderType, Payload};

    #[test]
    fn test_application_update_has_channel_policies() {
        let orgs = vec![
            OrganizationBuilder::peer("Org1", "Org1MSP").build(),
            OrganizationBuilder::peer("Org2", "Org2MSP").build(),
        ];
        let update = application_channel_update("mychannel", "SampleConsortium", &orgs).unwrap();

        let write = update.write_set.application.unwrap();
        assert_eq!(write.organizations.len(), 2);
        assert_eq!(write.capabilities, vec![APPLICATION_CAPABILITY.to_string()]);
        assert!(write.policies.contains_key(fabric_protos::config::ADMINS_POLICY));
        assert_eq!(update.read_set.consortium.as_deref(), Some("SampleConsortium"));

        assert!(application_channel_update("mychannel", "SampleConsortium", &[]).is_err());
    }

    #[test]
    fn test_application_source_signs_as_config_update() {
        let signer = Ed25519Signer::generate("Org1MSP");
        let source = ChannelSource::Application {
            consortium: "SampleConsortium".into(),
            organizations: vec![OrganizationBuilder::peer("Org1", "Org1MSP").build()],
        };
        let envelope = source.envelope("mychannel").unwrap();
        let signed = sanity_check_and_sign_config_tx(&envelope, &signer, "mychannel").unwrap();

        let payload: Payload = decode(&signed.payload).unwrap();
        let header: ChannelHeader = decode(&payload.header.unwrap().channel_header).unwrap();
        assert_eq!(header.header_type, HeaderType::ConfigUpdate);
        assert_eq!(header.channel_id, "mychannel");
    }

    #[test]
    fn test_envelope_file_source() {
        let envelope = ConfigUpdateEnvelope::new("mychannel", b"delta".to_vec()).create_envelope();
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), encode(&envelope)).unwrap();

        let loaded = ChannelSource::EnvelopeFile(file.path().to_path_buf())
            .envelope("ignored")
            .unwrap();
        assert_eq!(loaded, envelope);
    }
}
