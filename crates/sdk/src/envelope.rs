//! Signed envelopes that go straight to the ordering service or a deliver stream

use crate::error::Result;
use crate::proposal::now;
use crate::signer::Signer;
use fabric_protos::{encode, ChannelHeader, Envelope, Header, HeaderType, Payload, SeekInfo};

/// Wrap `data` in a payload with a fresh header and sign it
pub fn create_signed_envelope(
    header_type: HeaderType,
    channel_id: &str,
    signer: &dyn Signer,
    data: Vec<u8>,
    tls_cert_hash: Option<Vec<u8>>,
) -> Result<Envelope> {
    let signature_header = signer.new_signature_header()?;
    let channel_header = ChannelHeader {
        header_type,
        version: 0,
        timestamp: now(),
        channel_id: channel_id.to_string(),
        tx_id: String::new(),
        epoch: 0,
        extension: Vec::new(),
        tls_cert_hash,
    };
    let payload = encode(&Payload {
        header: Some(Header {
            channel_header: encode(&channel_header),
            signature_header: encode(&signature_header),
        }),
        data,
    });
    let signature = signer.sign(&payload)?;
    Ok(Envelope { payload, signature })
}

/// Signed deliver request for the given range of blocks
pub fn seek_envelope(
    channel_id: &str,
    signer: &dyn Signer,
    seek_info: &SeekInfo,
    tls_cert_hash: Option<Vec<u8>>,
) -> Result<Envelope> {
    create_signed_envelope(
        HeaderType::DeliverSeekInfo,
        channel_id,
        signer,
        encode(seek_info),
        tls_cert_hash,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{verify, Ed25519Signer};
    use fabric_protos::{decode, SeekPosition};

    #[test]
    fn test_seek_envelope_newest() {
        let signer = Ed25519Signer::generate("Org1MSP");
        let env = seek_envelope("mychannel", &signer, &SeekInfo::newest_onward(), Some(vec![9; 32])).unwrap();

        verify(&signer.serialize(), &env.payload, &env.signature).unwrap();
        let payload: Payload = decode(&env.payload).unwrap();
        let header = payload.header.unwrap();
        let channel_header: ChannelHeader = decode(&header.channel_header).unwrap();
        assert_eq!(channel_header.header_type, HeaderType::DeliverSeekInfo);
        assert_eq!(channel_header.tls_cert_hash, Some(vec![9; 32]));

        let seek: SeekInfo = decode(&payload.data).unwrap();
        assert_eq!(seek.start, SeekPosition::Newest);
        assert_eq!(seek.stop, SeekPosition::Specified(u64::MAX));
    }
}
