//! Channel operations and config update workflow against in-memory nodes

use super::mock::{config_block, data_block, Ledger, MockEndorser, MockOrderer};
use crate::channel::{fetch_block, fetch_config, get_chain_info, join, list_channels};
use crate::config_update::{
    initiate, sign_proposal, submit, ConfigChange, ProposalEnvelope, ProposalSignature, WriteSetComputer,
};
use crate::contract::Contract;
use crate::endorser::Endorser;
use crate::error::SdkError;
use crate::gateway::Gateway;
use crate::organization::OrganizationBuilder;
use crate::signer::{Ed25519Signer, Signer};
use crate::transaction::Endpoints;
use fabric_protos::config::{ApplicationGroup, ChannelGroup, Config};
use fabric_protos::{
    decode, encode, BlockchainInfo, ChannelInfo, ChannelQueryResponse, Payload, STATUS_INTERNAL_ERROR,
};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(1);

fn channel_config(orgs: &[&str]) -> Config {
    let mut application = ApplicationGroup::default();
    for name in orgs {
        let org = OrganizationBuilder::peer(*name, format!("{}MSP", name)).build();
        application.organizations.insert(name.to_string(), org);
    }
    Config {
        sequence: 3,
        channel_group: ChannelGroup {
            application: Some(application),
            ..Default::default()
        },
    }
}

/// Genesis config at 0, a data block at 1 and the latest config at 2
fn orderer_with_config(ledger: &Ledger, config: &Config) -> Arc<MockOrderer> {
    MockOrderer::with(
        ledger,
        fabric_protos::Status::Success,
        vec![config_block(0, &channel_config(&["Org1"])), data_block(1, 0), config_block(2, config), data_block(3, 2)],
    )
}

#[tokio::test]
async fn test_join_reports_every_peer() {
    let ledger = Ledger::new();
    let orderer = orderer_with_config(&ledger, &channel_config(&["Org1"]));
    let signer = Ed25519Signer::generate("Org1MSP");
    let peers = vec![
        MockEndorser::ok("peer0:7051", b"") as Arc<dyn Endorser>,
        MockEndorser::failing("peer1:7051") as Arc<dyn Endorser>,
    ];

    let responses = join(orderer.as_ref(), &signer, &peers, "mychannel", TIMEOUT).await.unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].status, 200);
    assert_eq!(responses[1].status, STATUS_INTERNAL_ERROR);
    assert_eq!(responses[1].payload, b"peer1:7051".to_vec());
}

#[tokio::test]
async fn test_join_without_genesis_block() {
    let ledger = Ledger::new();
    let orderer = MockOrderer::new(&ledger);
    let signer = Ed25519Signer::generate("Org1MSP");
    let peers = vec![MockEndorser::ok("peer0:7051", b"") as Arc<dyn Endorser>];

    assert!(join(orderer.as_ref(), &signer, &peers, "mychannel", TIMEOUT).await.is_err());
}

#[tokio::test]
async fn test_fetch_config_follows_last_config() {
    let ledger = Ledger::new();
    let config = channel_config(&["Org1", "Org2"]);
    let orderer = orderer_with_config(&ledger, &config);
    let signer = Ed25519Signer::generate("Org1MSP");

    let fetched = fetch_config(orderer.as_ref(), &signer, "mychannel", None, TIMEOUT).await.unwrap();
    assert_eq!(fetched.config, config);

    let block = fetch_block(orderer.as_ref(), &signer, "mychannel", Some(1), None, TIMEOUT)
        .await
        .unwrap();
    assert_eq!(block.header.number, 1);
    let newest = fetch_block(orderer.as_ref(), &signer, "mychannel", None, None, TIMEOUT)
        .await
        .unwrap();
    assert_eq!(newest.header.number, 3);

    let err = fetch_block(orderer.as_ref(), &signer, "mychannel", Some(42), None, TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::UnexpectedDeliverResponse { address, .. } if address == "orderer0:7050"));
}

#[tokio::test]
async fn test_peer_channel_queries() {
    let signer = Ed25519Signer::generate("Org1MSP");
    let channels = ChannelQueryResponse {
        channels: vec![
            ChannelInfo {
                channel_id: "mychannel".into(),
            },
            ChannelInfo {
                channel_id: "audit".into(),
            },
        ],
    };
    let peer = MockEndorser::ok("peer0:7051", &encode(&channels));
    let listed = list_channels(&signer, peer.as_ref(), TIMEOUT).await.unwrap();
    assert_eq!(listed, vec!["mychannel".to_string(), "audit".to_string()]);

    let info = BlockchainInfo {
        height: 12,
        current_block_hash: vec![1; 32],
        previous_block_hash: vec![2; 32],
    };
    let peer = MockEndorser::ok("peer0:7051", &encode(&info));
    assert_eq!(get_chain_info(&signer, peer.as_ref(), "mychannel", TIMEOUT).await.unwrap(), info);
}

#[tokio::test]
async fn test_add_existing_org_makes_no_network_call() {
    let ledger = Ledger::new();
    let orderer = orderer_with_config(&ledger, &channel_config(&["Org1", "Org2", "Org3"]));
    let signer = Ed25519Signer::generate("Org1MSP");
    let change = ConfigChange::ChannelAddOrg(OrganizationBuilder::peer("Org3", "Org3MSP").build());

    let err = initiate(orderer.as_ref(), &signer, "mychannel", &change, &WriteSetComputer, TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::OrganizationExists(name) if name == "Org3"));
    assert!(orderer.received().is_empty());
}

#[tokio::test]
async fn test_add_org_with_collected_signatures() {
    let ledger = Ledger::new();
    let orderer = orderer_with_config(&ledger, &channel_config(&["Org1", "Org2"]));
    let org1 = Ed25519Signer::generate("Org1MSP");
    let org2 = Ed25519Signer::generate("Org2MSP");
    let change = ConfigChange::ChannelAddOrg(OrganizationBuilder::peer("Org3", "Org3MSP").build());

    let proposal = initiate(orderer.as_ref(), &org1, "mychannel", &change, &WriteSetComputer, TIMEOUT)
        .await
        .unwrap();
    let org2_signature = sign_proposal(&org2, &proposal).unwrap();

    // Only the initiating organization may submit
    let err = submit(orderer.as_ref(), &org2, &proposal, &[org2_signature.clone()], TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::ProposerMismatch { .. }));
    assert!(orderer.received().is_empty());

    submit(orderer.as_ref(), &org1, &proposal, &[org2_signature], TIMEOUT)
        .await
        .unwrap();
    let received = orderer.received();
    assert_eq!(received.len(), 1);
    let payload: Payload = decode(&received[0].payload).unwrap();
    let update: fabric_protos::config::ConfigUpdateEnvelope = decode(&payload.data).unwrap();
    assert_eq!(update.signatures.len(), 2);
}

#[tokio::test]
async fn test_contract_requires_committed_chaincode() {
    let ledger = Ledger::new();
    let endpoints = Endpoints::new(MockOrderer::new(&ledger))
        .with_endorsers(vec![MockEndorser::ok("peer0:7051", b"rw") as Arc<dyn Endorser>])
        .with_committer(MockEndorser::status("peer0:7051", 404, b""));
    let signer: Arc<dyn Signer> = Arc::new(Ed25519Signer::generate("Org1MSP"));

    let err = Contract::new(signer, endpoints, "mychannel", "missing").await.err().unwrap();
    assert!(matches!(err, SdkError::EndorsementFailed { status: 404, .. }));
}

#[tokio::test]
async fn test_gateway_join_surfaces_failed_peer() {
    let ledger = Ledger::new();
    let orderer = orderer_with_config(&ledger, &channel_config(&["Org1"]));
    let endpoints = Endpoints::new(orderer).with_endorsers(vec![
        MockEndorser::ok("peer0:7051", b"") as Arc<dyn Endorser>,
        MockEndorser::status("peer1:7051", 500, b"") as Arc<dyn Endorser>,
    ]);
    let gateway = Gateway::new(Arc::new(Ed25519Signer::generate("Org1MSP")), endpoints);

    let response = gateway.join_channel("mychannel").await.unwrap();
    assert_eq!(response.status, 500);
    assert!(!response.is_success());

    let response = gateway.fetch_block("mychannel", Some(0)).await.unwrap();
    let block: fabric_protos::Block = decode(&response.payload).unwrap();
    assert_eq!(block.header.number, 0);
}

#[tokio::test]
async fn test_gateway_proposal_workflow() {
    let ledger = Ledger::new();
    let orderer = orderer_with_config(&ledger, &channel_config(&["Org1", "Org2"]));
    let org1 = Gateway::new(Arc::new(Ed25519Signer::generate("Org1MSP")), Endpoints::new(orderer.clone()));
    let org2 = Gateway::new(Arc::new(Ed25519Signer::generate("Org2MSP")), Endpoints::new(orderer.clone()));
    let change = ConfigChange::ChannelAddOrg(OrganizationBuilder::peer("Org3", "Org3MSP").build());

    let response = org1.proposal_initiate("mychannel", &change).await.unwrap();
    let proposal: ProposalEnvelope = serde_json::from_slice(&response.payload).unwrap();
    assert_eq!(proposal.sponsor.creator, "Org1MSP");

    let response = org2.proposal_sign(&proposal).unwrap();
    assert_eq!(response.message, "Org2MSP");
    let signature: ProposalSignature = serde_json::from_slice(&response.payload).unwrap();

    assert!(matches!(
        org2.proposal_submit(&proposal, &[signature.clone()]).await,
        Err(SdkError::ProposerMismatch { .. })
    ));
    let response = org1.proposal_submit(&proposal, &[signature]).await.unwrap();
    assert!(response.is_success());
    assert_eq!(orderer.received().len(), 1);
}
