//! Borsh encoding helpers

use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("failed to decode {kind}: {reason}")]
    Decode { kind: &'static str, reason: String },

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize a message for network transmission
pub fn encode<T: BorshSerialize>(value: &T) -> Vec<u8> {
    borsh::to_vec(value).expect("serialization into a Vec should not fail")
}

/// Deserialize a message received from the network
pub fn decode<T: BorshDeserialize>(data: &[u8]) -> Result<T, CodecError> {
    borsh::from_slice(data).map_err(|e| CodecError::Decode {
        kind: std::any::type_name::<T>(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Envelope;

    #[test]
    fn test_decode_garbage_names_type() {
        let err = decode::<Envelope>(&[0xff, 0xff]).unwrap_err();
        assert!(err.to_string().contains("Envelope"));
    }
}
