//! Identity and signing
//!
//! The SDK only needs four things from an identity:
//! - its serialized form, embedded as the creator of every header
//! - a signature over arbitrary bytes
//! - a fresh signature header (creator + nonce)
//! - the organization id used to key configuration signatures

use crate::error::{Result, SdkError};
use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use fabric_protos::{decode, encode, Proposal, SerializedIdentity, SignatureHeader, SignedProposal};
use rand::rngs::OsRng;
use rand::RngCore;
use std::path::Path;

/// Length of the random nonce placed in every signature header
pub const NONCE_SIZE: usize = 24;

/// Signing identity; must be usable from several tasks at once
pub trait Signer: Send + Sync {
    /// Serialized identity embedded as the creator of headers
    fn serialize(&self) -> Vec<u8>;

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;

    fn org_id(&self) -> &str;

    fn new_signature_header(&self) -> Result<SignatureHeader> {
        Ok(SignatureHeader {
            creator: self.serialize(),
            nonce: new_nonce(),
        })
    }
}

pub fn new_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Transaction id derived from the header nonce and creator
pub fn compute_tx_id(nonce: &[u8], creator: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(nonce);
    hasher.update(creator);
    hex::encode(hasher.finalize().as_bytes())
}

/// Content hash used to match detached signatures with the bytes they cover
pub fn content_hash(data: &[u8]) -> Vec<u8> {
    blake3::hash(data).as_bytes().to_vec()
}

/// Sign an encoded proposal
pub fn sign_proposal(proposal: &Proposal, signer: &dyn Signer) -> Result<SignedProposal> {
    let proposal_bytes = encode(proposal);
    let signature = signer.sign(&proposal_bytes)?;
    Ok(SignedProposal {
        proposal_bytes,
        signature,
    })
}

/// Check a signature made by the holder of a serialized identity
pub fn verify(identity: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    let identity: SerializedIdentity = decode(identity)?;
    let key_bytes: [u8; 32] = identity
        .id_bytes
        .as_slice()
        .try_into()
        .map_err(|_| SdkError::Signing("identity is not an ed25519 public key".into()))?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|e| SdkError::Signing(e.to_string()))?;
    let signature =
        ed25519_dalek::Signature::from_slice(signature).map_err(|e| SdkError::Signing(e.to_string()))?;
    key.verify(message, &signature)
        .map_err(|e| SdkError::Signing(e.to_string()))
}

/// Ed25519 identity bound to one organization
pub struct Ed25519Signer {
    org_id: String,
    key: SigningKey,
    identity: Vec<u8>,
}

impl Ed25519Signer {
    pub fn new(org_id: impl Into<String>, key: SigningKey) -> Self {
        let org_id = org_id.into();
        let identity = encode(&SerializedIdentity {
            org_id: org_id.clone(),
            id_bytes: key.verifying_key().to_bytes().to_vec(),
        });
        Self { org_id, key, identity }
    }

    pub fn generate(org_id: impl Into<String>) -> Self {
        Self::new(org_id, SigningKey::generate(&mut OsRng))
    }

    /// Load a hex encoded 32 byte secret key
    pub fn from_hex(org_id: impl Into<String>, secret: &str) -> Result<Self> {
        let bytes = hex::decode(secret.trim())
            .map_err(|e| SdkError::InvalidArgument(format!("bad secret key hex: {}", e)))?;
        let secret: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| SdkError::InvalidArgument(format!("secret key must be 32 bytes, got {}", bytes.len())))?;
        Ok(Self::new(org_id, SigningKey::from_bytes(&secret)))
    }

    pub fn from_key_file(org_id: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let secret = std::fs::read_to_string(path)?;
        Self::from_hex(org_id, &secret)
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl Signer for Ed25519Signer {
    fn serialize(&self) -> Vec<u8> {
        self.identity.clone()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }

    fn org_id(&self) -> &str {
        &self.org_id
    }
}
