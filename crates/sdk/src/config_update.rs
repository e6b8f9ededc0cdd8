//! Multi-organization configuration updates
//!
//! Membership changes follow a three step workflow that may span several
//! clients:
//! - the sponsor fetches the channel config, computes the delta and signs it ([`initiate`])
//! - every other organization signs the same delta on its own ([`sign_proposal`])
//! - the sponsor merges the signatures and submits the update ([`submit`])
//!
//! Signatures are matched to the delta by content hash, and each organization
//! may sign at most once.

use crate::block::{config_from_block, BlockFetcher};
use crate::broadcast::{broadcast_envelope, OrdererClient};
use crate::envelope::create_signed_envelope;
use crate::error::{Result, SdkError};
use crate::signer::{content_hash, verify, Signer};
use fabric_protos::config::{ChannelGroup, Config, ConfigUpdate, Organization};
use fabric_protos::{decode, encode, ChannelHeader, ConfigSignature, Envelope, HeaderType, Payload, SerializedIdentity, SignatureHeader};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Membership change requested by a sponsor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    ChannelAddOrg(Organization),
    ChannelRemoveOrg(String),
    ConsortiumAddOrg { consortium: String, org: Organization },
    ConsortiumRemoveOrg { consortium: String, name: String },
}

impl ConfigChange {
    /// Apply the change to a copy of `config`
    pub fn apply(&self, config: &Config) -> Result<Config> {
        let mut updated = config.clone();
        let group = &mut updated.channel_group;

        match self {
            ConfigChange::ChannelAddOrg(org) => {
                let orgs = &mut application_mut(group)?.organizations;
                if orgs.contains_key(&org.name) {
                    return Err(SdkError::OrganizationExists(org.name.clone()));
                }
                orgs.insert(org.name.clone(), org.clone());
            }
            ConfigChange::ChannelRemoveOrg(name) => {
                if application_mut(group)?.organizations.remove(name).is_none() {
                    return Err(SdkError::OrganizationNotFound(name.clone()));
                }
            }
            ConfigChange::ConsortiumAddOrg { consortium, org } => {
                let orgs = &mut consortium_mut(group, consortium)?.organizations;
                if orgs.contains_key(&org.name) {
                    return Err(SdkError::OrganizationExists(org.name.clone()));
                }
                orgs.insert(org.name.clone(), org.clone());
            }
            ConfigChange::ConsortiumRemoveOrg { consortium, name } => {
                if consortium_mut(group, consortium)?.organizations.remove(name).is_none() {
                    return Err(SdkError::OrganizationNotFound(name.clone()));
                }
            }
        }
        Ok(updated)
    }
}

fn application_mut(group: &mut ChannelGroup) -> Result<&mut fabric_protos::config::ApplicationGroup> {
    group
        .application
        .as_mut()
        .ok_or_else(|| SdkError::ConfigDelta("channel has no application group".into()))
}

fn consortium_mut<'a>(
    group: &'a mut ChannelGroup,
    name: &str,
) -> Result<&'a mut fabric_protos::config::ConsortiumGroup> {
    group
        .consortiums
        .get_mut(name)
        .ok_or_else(|| SdkError::ConsortiumNotFound(name.to_string()))
}

/// Computes the delta between two configuration states
pub trait ConfigDeltaComputer: Send + Sync {
    fn compute(&self, channel_id: &str, original: &Config, updated: &Config) -> Result<ConfigUpdate>;
}

/// Puts every changed top-level group in the write set and its original in the read set
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteSetComputer;

impl ConfigDeltaComputer for WriteSetComputer {
    fn compute(&self, channel_id: &str, original: &Config, updated: &Config) -> Result<ConfigUpdate> {
        let before = &original.channel_group;
        let after = &updated.channel_group;
        if before == after {
            return Err(SdkError::ConfigDelta("no differences detected between original and updated config".into()));
        }

        let mut read_set = ChannelGroup::default();
        let mut write_set = ChannelGroup::default();

        if before.application != after.application {
            read_set.application = before.application.clone();
            write_set.application = after.application.clone();
        }
        if before.orderer != after.orderer {
            read_set.orderer = before.orderer.clone();
            write_set.orderer = after.orderer.clone();
        }
        for (name, consortium) in &after.consortiums {
            if before.consortiums.get(name) != Some(consortium) {
                if let Some(old) = before.consortiums.get(name) {
                    read_set.consortiums.insert(name.clone(), old.clone());
                }
                write_set.consortiums.insert(name.clone(), consortium.clone());
            }
        }
        if before.policies != after.policies {
            read_set.policies = before.policies.clone();
            write_set.policies = after.policies.clone();
        }
        if before.capabilities != after.capabilities {
            read_set.capabilities = before.capabilities.clone();
            write_set.capabilities = after.capabilities.clone();
        }
        read_set.consortium = before.consortium.clone();
        write_set.consortium = after.consortium.clone();

        Ok(ConfigUpdate {
            channel_id: channel_id.to_string(),
            read_sequence: original.sequence,
            read_set,
            write_set,
        })
    }
}

/// Sign an encoded config update on behalf of the signer's organization
pub fn sign_config_update(signer: &dyn Signer, config_update: &[u8]) -> Result<ConfigSignature> {
    let signature_header = encode(&signer.new_signature_header()?);
    let mut message = signature_header.clone();
    message.extend_from_slice(config_update);
    let signature = signer.sign(&message)?;
    Ok(ConfigSignature {
        signature_header,
        signature,
    })
}

/// Organization that produced a config signature, after checking the signature
fn verify_config_signature(signature: &ConfigSignature, config_update: &[u8]) -> Result<String> {
    let header: SignatureHeader = decode(&signature.signature_header)?;
    let identity: SerializedIdentity = decode(&header.creator)?;
    let mut message = signature.signature_header.clone();
    message.extend_from_slice(config_update);
    verify(&header.creator, &message, &signature.signature).map_err(|_| SdkError::SignatureMismatch {
        creator: identity.org_id.clone(),
    })?;
    Ok(identity.org_id)
}

/// Config update plus the signatures collected for it, keyed by organization
#[derive(Debug, Clone)]
pub struct ConfigUpdateEnvelope {
    channel_id: String,
    config_update: Vec<u8>,
    signatures: BTreeMap<String, ConfigSignature>,
}

impl ConfigUpdateEnvelope {
    pub fn new(channel_id: impl Into<String>, config_update: Vec<u8>) -> Self {
        Self {
            channel_id: channel_id.into(),
            config_update,
            signatures: BTreeMap::new(),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Encoded `ConfigUpdate`
    pub fn config_update(&self) -> &[u8] {
        &self.config_update
    }

    pub fn signatures(&self) -> &BTreeMap<String, ConfigSignature> {
        &self.signatures
    }

    /// Add the signer's organization signature
    pub fn sign_by(&mut self, signer: &dyn Signer) -> Result<()> {
        let org_id = signer.org_id();
        if self.signatures.contains_key(org_id) {
            return Err(SdkError::AlreadySigned(org_id.to_string()));
        }
        let signature = sign_config_update(signer, &self.config_update)?;
        self.signatures.insert(org_id.to_string(), signature);
        tracing::info!("Organization {} signed config update for {}", org_id, self.channel_id);
        Ok(())
    }

    /// Add a signature collected elsewhere; it must verify against this update
    pub fn add_signature(&mut self, signature: ConfigSignature) -> Result<()> {
        let org_id = verify_config_signature(&signature, &self.config_update)?;
        match self.signatures.get(&org_id) {
            Some(existing) if *existing == signature => Ok(()),
            Some(_) => Err(SdkError::AlreadySigned(org_id)),
            None => {
                self.signatures.insert(org_id, signature);
                Ok(())
            }
        }
    }

    /// Unsigned `CONFIG_UPDATE` envelope carrying the update and its signatures
    pub fn create_envelope(&self) -> Envelope {
        let data = encode(&fabric_protos::config::ConfigUpdateEnvelope {
            config_update: self.config_update.clone(),
            signatures: self.signatures.values().cloned().collect(),
        });
        let header = fabric_protos::Header {
            channel_header: encode(&ChannelHeader {
                header_type: HeaderType::ConfigUpdate,
                version: 0,
                timestamp: crate::proposal::now(),
                channel_id: self.channel_id.clone(),
                tx_id: String::new(),
                epoch: 0,
                extension: Vec::new(),
                tls_cert_hash: None,
            }),
            signature_header: Vec::new(),
        };
        Envelope {
            payload: encode(&Payload {
                header: Some(header),
                data,
            }),
            signature: Vec::new(),
        }
    }
}

/// Validate a config update envelope, add the signer's signature and sign it
///
/// An empty `channel_id` adopts the one found in the envelope.
pub fn sanity_check_and_sign_config_tx(envelope: &Envelope, signer: &dyn Signer, channel_id: &str) -> Result<Envelope> {
    let payload: Payload = decode(&envelope.payload)?;
    let header = payload
        .header
        .ok_or_else(|| SdkError::InvalidArgument("bad header".into()))?;
    let channel_header: ChannelHeader = decode(&header.channel_header)?;

    if channel_header.header_type != HeaderType::ConfigUpdate {
        return Err(SdkError::InvalidArgument(format!("bad type {:?}", channel_header.header_type)));
    }
    if channel_header.channel_id.is_empty() {
        return Err(SdkError::InvalidArgument("empty channel id".into()));
    }
    let channel_id = if channel_id.is_empty() {
        channel_header.channel_id.as_str()
    } else {
        channel_id
    };
    if channel_header.channel_id != channel_id {
        return Err(SdkError::InvalidArgument(format!(
            "mismatched channel name {} != {}",
            channel_header.channel_id, channel_id
        )));
    }

    let mut update: fabric_protos::config::ConfigUpdateEnvelope = decode(&payload.data)?;
    let already_signed = update.signatures.iter().any(|sig| {
        decode::<SignatureHeader>(&sig.signature_header)
            .and_then(|h| decode::<SerializedIdentity>(&h.creator))
            .map(|identity| identity.org_id == signer.org_id())
            .unwrap_or(false)
    });
    if !already_signed {
        update.signatures.push(sign_config_update(signer, &update.config_update)?);
    }

    create_signed_envelope(HeaderType::ConfigUpdate, channel_id, signer, encode(&update), None)
}

/// Detached signature over a proposed config update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalSignature {
    pub proposal_hash: Vec<u8>,
    /// Organization id of the signer
    pub creator: String,
    /// Encoded `ConfigSignature`
    pub signature: Vec<u8>,
}

/// Proposed config update as handed to other organizations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalEnvelope {
    pub channel_id: String,
    /// Encoded `ConfigUpdate`
    pub proposal: Vec<u8>,
    /// Signature of the initiating organization
    pub sponsor: ProposalSignature,
}

/// Apply a change to `config`, compute the delta and sign it as sponsor
pub fn propose(
    signer: &dyn Signer,
    channel_id: &str,
    config: &Config,
    change: &ConfigChange,
    computer: &dyn ConfigDeltaComputer,
) -> Result<ProposalEnvelope> {
    let updated = change.apply(config)?;
    let update = computer.compute(channel_id, config, &updated)?;
    let proposal = encode(&update);
    let sponsor = sign_proposal_bytes(signer, &proposal)?;

    tracing::info!("Organization {} proposed config update for {}", sponsor.creator, channel_id);
    Ok(ProposalEnvelope {
        channel_id: channel_id.to_string(),
        proposal,
        sponsor,
    })
}

/// Fetch the channel's current config and propose a change against it
pub async fn initiate(
    orderer: &dyn OrdererClient,
    signer: &dyn Signer,
    channel_id: &str,
    change: &ConfigChange,
    computer: &dyn ConfigDeltaComputer,
    timeout: Duration,
) -> Result<ProposalEnvelope> {
    let block = BlockFetcher::new(orderer, signer, channel_id)
        .timeout(timeout)
        .get_config_block()
        .await?;
    let config = config_from_block(&block)?;
    propose(signer, channel_id, &config.config, change, computer)
}

/// Sign a proposal received from a sponsor
pub fn sign_proposal(signer: &dyn Signer, envelope: &ProposalEnvelope) -> Result<ProposalSignature> {
    sign_proposal_bytes(signer, &envelope.proposal)
}

fn sign_proposal_bytes(signer: &dyn Signer, proposal: &[u8]) -> Result<ProposalSignature> {
    let signature = sign_config_update(signer, proposal)?;
    Ok(ProposalSignature {
        proposal_hash: content_hash(proposal),
        creator: signer.org_id().to_string(),
        signature: encode(&signature),
    })
}

/// Merge the sponsor's and the collected signatures into an update envelope
///
/// Only the sponsor may do this. Signatures over a different proposal are rejected.
pub fn collect_signatures(
    signer: &dyn Signer,
    envelope: &ProposalEnvelope,
    signatures: &[ProposalSignature],
) -> Result<ConfigUpdateEnvelope> {
    let sponsor = &envelope.sponsor;
    if sponsor.creator != signer.org_id() {
        return Err(SdkError::ProposerMismatch {
            sponsor: sponsor.creator.clone(),
            submitter: signer.org_id().to_string(),
        });
    }
    if sponsor.proposal_hash != content_hash(&envelope.proposal) {
        return Err(SdkError::SignatureMismatch {
            creator: sponsor.creator.clone(),
        });
    }

    let mut update = ConfigUpdateEnvelope::new(envelope.channel_id.clone(), envelope.proposal.clone());
    for signature in std::iter::once(sponsor).chain(signatures) {
        if signature.proposal_hash != sponsor.proposal_hash {
            tracing::warn!("Rejecting signature from {} made over a different proposal", signature.creator);
            return Err(SdkError::SignatureMismatch {
                creator: signature.creator.clone(),
            });
        }
        update.add_signature(decode(&signature.signature)?)?;
    }
    Ok(update)
}

/// Submit a proposal with the collected signatures to the ordering service
pub async fn submit(
    orderer: &dyn OrdererClient,
    signer: &dyn Signer,
    envelope: &ProposalEnvelope,
    signatures: &[ProposalSignature],
    timeout: Duration,
) -> Result<()> {
    let update = collect_signatures(signer, envelope, signatures)?;
    tracing::info!(
        "Submitting config update for {} with {} signatures",
        envelope.channel_id,
        update.signatures().len()
    );
    let signed = sanity_check_and_sign_config_tx(&update.create_envelope(), signer, &envelope.channel_id)?;
    broadcast_envelope(orderer, &signed, timeout).await
}
