//! Transaction assembly from endorsement responses

use crate::error::{Result, SdkError};
use crate::signer::Signer;
use fabric_protos::{
    decode, encode, ChaincodeActionPayload, ChaincodeEndorsedAction, ChaincodeProposalPayload, Envelope, Header,
    Payload, Proposal, ProposalResponse, SignatureHeader, Transaction, TransactionAction, STATUS_ERROR_THRESHOLD,
    STATUS_OK,
};

/// Whether an endorser status counts as a successful simulation
pub fn is_success(status: i32) -> bool {
    (STATUS_OK..STATUS_ERROR_THRESHOLD).contains(&status)
}

/// Merge agreeing endorsements into a signed transaction envelope
///
/// Fails when there are no responses, when the signer is not the proposal
/// creator, when any response is unsuccessful, or when the simulated
/// payloads differ between endorsers.
pub fn create_signed_tx(proposal: &Proposal, signer: &dyn Signer, responses: &[ProposalResponse]) -> Result<Envelope> {
    let first = responses.first().ok_or(SdkError::NoResponses)?;

    let header: Header = decode(&proposal.header)?;
    let signature_header: SignatureHeader = decode(&header.signature_header)?;
    if signer.serialize() != signature_header.creator {
        return Err(SdkError::CreatorMismatch);
    }

    for response in responses {
        if !is_success(response.response.status) {
            return Err(SdkError::EndorsementFailed {
                status: response.response.status,
                message: response.response.message.clone(),
            });
        }
    }

    if responses.iter().any(|r| r.payload != first.payload) {
        return Err(SdkError::EndorsementMismatch);
    }

    let endorsements = responses
        .iter()
        .filter_map(|r| r.endorsement.clone())
        .collect::<Vec<_>>();

    // Transient data is private to the endorsers
    let mut proposal_payload: ChaincodeProposalPayload = decode(&proposal.payload)?;
    proposal_payload.transient_map.clear();

    let action_payload = ChaincodeActionPayload {
        chaincode_proposal_payload: encode(&proposal_payload),
        action: ChaincodeEndorsedAction {
            proposal_response_payload: first.payload.clone(),
            endorsements,
        },
    };
    let transaction = Transaction {
        actions: vec![TransactionAction {
            header: header.signature_header.clone(),
            payload: encode(&action_payload),
        }],
    };

    let payload = encode(&Payload {
        header: Some(header),
        data: encode(&transaction),
    });
    let signature = signer.sign(&payload)?;

    tracing::debug!("Assembled transaction from {} endorsements", responses.len());
    Ok(Envelope { payload, signature })
}
