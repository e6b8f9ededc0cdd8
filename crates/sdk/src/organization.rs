//! Organization definitions with the standard membership policies

use fabric_protos::config::{
    AnchorPeer, Organization, OrganizationKind, Policy, ADMINS_POLICY, BLOCK_VALIDATION_POLICY, ENDORSEMENT_POLICY,
    LIFECYCLE_ENDORSEMENT_POLICY, READERS_POLICY, WRITERS_POLICY,
};
use std::collections::BTreeMap;

/// Capability level set on new application channels
pub const APPLICATION_CAPABILITY: &str = "V2_0";

/// Builder for a peer or orderer organization
#[derive(Debug, Clone)]
pub struct OrganizationBuilder {
    org: Organization,
}

impl OrganizationBuilder {
    pub fn peer(name: impl Into<String>, msp_id: impl Into<String>) -> Self {
        Self::new(name.into(), msp_id.into(), OrganizationKind::Peer)
    }

    pub fn orderer(name: impl Into<String>, msp_id: impl Into<String>) -> Self {
        Self::new(name.into(), msp_id.into(), OrganizationKind::Orderer)
    }

    fn new(name: String, msp_id: String, kind: OrganizationKind) -> Self {
        let policies = match kind {
            OrganizationKind::Peer => peer_org_policies(&msp_id),
            OrganizationKind::Orderer => orderer_org_policies(&msp_id),
        };
        Self {
            org: Organization {
                name,
                msp_id,
                kind,
                root_certs: Vec::new(),
                tls_root_certs: Vec::new(),
                admin_certs: Vec::new(),
                anchor_peers: Vec::new(),
                orderer_endpoints: Vec::new(),
                policies,
            },
        }
    }

    pub fn root_cert(mut self, der: Vec<u8>) -> Self {
        self.org.root_certs.push(der);
        self
    }

    pub fn tls_root_cert(mut self, der: Vec<u8>) -> Self {
        self.org.tls_root_certs.push(der);
        self
    }

    pub fn admin_cert(mut self, der: Vec<u8>) -> Self {
        self.org.admin_certs.push(der);
        self
    }

    /// Anchor peers only apply to peer organizations
    pub fn anchor_peer(mut self, host: impl Into<String>, port: u16) -> Self {
        if self.org.kind == OrganizationKind::Peer {
            self.org.anchor_peers.push(AnchorPeer {
                host: host.into(),
                port,
            });
        }
        self
    }

    /// Endpoints only apply to orderer organizations
    pub fn orderer_endpoint(mut self, host: &str, port: u16) -> Self {
        if self.org.kind == OrganizationKind::Orderer {
            self.org.orderer_endpoints.push(format!("{}:{}", host, port));
        }
        self
    }

    pub fn build(self) -> Organization {
        self.org
    }
}

pub fn peer_org_policies(msp_id: &str) -> BTreeMap<String, Policy> {
    BTreeMap::from([
        (
            READERS_POLICY.to_string(),
            Policy::signature(format!("OR('{0}.admin', '{0}.peer', '{0}.client')", msp_id)),
        ),
        (
            WRITERS_POLICY.to_string(),
            Policy::signature(format!("OR('{0}.admin', '{0}.client')", msp_id)),
        ),
        (ADMINS_POLICY.to_string(), Policy::signature(format!("OR('{}.admin')", msp_id))),
        (ENDORSEMENT_POLICY.to_string(), Policy::signature(format!("OR('{}.peer')", msp_id))),
    ])
}

pub fn orderer_org_policies(msp_id: &str) -> BTreeMap<String, Policy> {
    BTreeMap::from([
        (READERS_POLICY.to_string(), Policy::signature(format!("OR('{}.member')", msp_id))),
        (WRITERS_POLICY.to_string(), Policy::signature(format!("OR('{}.member')", msp_id))),
        (ADMINS_POLICY.to_string(), Policy::signature(format!("OR('{}.admin')", msp_id))),
    ])
}

/// Implicit meta policies of an application channel
pub fn application_channel_policies() -> BTreeMap<String, Policy> {
    BTreeMap::from([
        (READERS_POLICY.to_string(), Policy::implicit_meta("ANY Readers")),
        (WRITERS_POLICY.to_string(), Policy::implicit_meta("ANY Writers")),
        (ADMINS_POLICY.to_string(), Policy::implicit_meta("MAJORITY Admins")),
        (ENDORSEMENT_POLICY.to_string(), Policy::implicit_meta("MAJORITY Endorsement")),
        (LIFECYCLE_ENDORSEMENT_POLICY.to_string(), Policy::implicit_meta("MAJORITY Endorsement")),
    ])
}

/// Implicit meta policies of the orderer group
pub fn orderer_group_policies() -> BTreeMap<String, Policy> {
    BTreeMap::from([
        (READERS_POLICY.to_string(), Policy::implicit_meta("ANY Readers")),
        (WRITERS_POLICY.to_string(), Policy::implicit_meta("ANY Writers")),
        (ADMINS_POLICY.to_string(), Policy::implicit_meta("MAJORITY Admins")),
        (BLOCK_VALIDATION_POLICY.to_string(), Policy::implicit_meta("ANY Writers")),
    ])
}
