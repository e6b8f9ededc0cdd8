//! Commit confirmation through the deliver group

use super::mock::{filtered_block, DeliverBehavior, Ledger, MockDeliverClient, MockEndorser, MockOrderer};
use crate::deliver::{DeliverClient, DeliverGroup};
use crate::endorser::Endorser;
use crate::config::Timeouts;
use crate::error::{DeliverPhase, SdkError};
use crate::gateway::Gateway;
use crate::proposal::{Invocation, ProposalKind};
use crate::signer::{Ed25519Signer, Signer};
use crate::transaction::{invoke, Endpoints};
use fabric_protos::{DeliverResponse, Status, TxValidationCode};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn signer() -> Arc<dyn Signer> {
    Arc::new(Ed25519Signer::generate("Org1MSP"))
}

fn endpoints(ledger: &Ledger, orderer: Arc<MockOrderer>, delivers: Vec<DeliverBehavior>) -> Endpoints {
    let delivers = delivers
        .into_iter()
        .enumerate()
        .map(|(i, behavior)| {
            MockDeliverClient::new(&format!("peer{}:7051", i), ledger, behavior) as Arc<dyn DeliverClient>
        })
        .collect();
    Endpoints::new(orderer)
        .with_endorsers(vec![MockEndorser::ok("peer0:7051", b"rw") as Arc<dyn Endorser>])
        .with_delivers(delivers)
}

fn put() -> ProposalKind {
    ProposalKind::Invoke(Invocation::new("basic", vec![b"put".to_vec()]))
}

#[tokio::test]
async fn test_commit_confirmed_by_every_peer() {
    let ledger = Ledger::new();
    let orderer = MockOrderer::new(&ledger);
    let endpoints = endpoints(
        &ledger,
        orderer.clone(),
        vec![
            DeliverBehavior::Commit(TxValidationCode::Valid),
            DeliverBehavior::Commit(TxValidationCode::Valid),
        ],
    );

    let result = invoke(&signer(), &endpoints, "mychannel", &put(), Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(result.response.status, 200);
    assert_eq!(orderer.received().len(), 1);
}

#[tokio::test]
async fn test_one_invalidating_peer_fails_the_wait() {
    let ledger = Ledger::new();
    let orderer = MockOrderer::new(&ledger);
    let endpoints = endpoints(
        &ledger,
        orderer.clone(),
        vec![
            DeliverBehavior::Commit(TxValidationCode::Valid),
            DeliverBehavior::Commit(TxValidationCode::MvccReadConflict),
        ],
    );

    let err = invoke(&signer(), &endpoints, "mychannel", &put(), Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        SdkError::TxInvalidated { address, code: TxValidationCode::MvccReadConflict, .. } if address == "peer1:7051"
    ));
    assert!(err.is_commit_failure());
    assert!(!err.is_timeout());
    // Ordered even though confirmation failed
    assert_eq!(orderer.received().len(), 1);
}

#[tokio::test]
async fn test_silent_peer_times_out() {
    let ledger = Ledger::new();
    let orderer = MockOrderer::new(&ledger);
    let endpoints = endpoints(
        &ledger,
        orderer.clone(),
        vec![DeliverBehavior::Commit(TxValidationCode::Valid), DeliverBehavior::Silent],
    );

    let err = invoke(&signer(), &endpoints, "mychannel", &put(), Some(Duration::from_millis(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::DeliverTimeout { phase: DeliverPhase::Wait, .. }));
    assert!(err.is_timeout());
    assert!(err.is_commit_failure());
}

#[tokio::test]
async fn test_unreachable_peer_fails_before_broadcast() {
    let ledger = Ledger::new();
    let orderer = MockOrderer::new(&ledger);
    let endpoints = endpoints(
        &ledger,
        orderer.clone(),
        vec![DeliverBehavior::Commit(TxValidationCode::Valid), DeliverBehavior::Unreachable],
    );

    let err = invoke(&signer(), &endpoints, "mychannel", &put(), Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Transport { .. }));
    assert!(orderer.received().is_empty());
}

#[tokio::test]
async fn test_first_failure_ends_wait_early() {
    let ledger = Ledger::new();
    let clients = vec![
        MockDeliverClient::new(
            "peer0:7051",
            &ledger,
            DeliverBehavior::Scripted(vec![DeliverResponse::FilteredBlock(filtered_block(
                3,
                "tx1",
                TxValidationCode::EndorsementPolicyFailure,
            ))]),
        ) as Arc<dyn DeliverClient>,
        MockDeliverClient::new("peer1:7051", &ledger, DeliverBehavior::Silent) as Arc<dyn DeliverClient>,
    ];
    let mut group = DeliverGroup::new(clients, signer(), "mychannel", "tx1");
    group.connect(Duration::from_secs(1)).await.unwrap();

    let started = Instant::now();
    let err = group.wait(Duration::from_secs(10)).await.unwrap_err();
    assert!(matches!(err, SdkError::TxInvalidated { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(group.confirmed(), 0);
}

#[tokio::test]
async fn test_other_transactions_are_skipped() {
    let ledger = Ledger::new();
    let script = vec![
        DeliverResponse::FilteredBlock(filtered_block(1, "other", TxValidationCode::MvccReadConflict)),
        DeliverResponse::FilteredBlock(filtered_block(2, "tx1", TxValidationCode::Valid)),
    ];
    let clients = vec![MockDeliverClient::new("peer0:7051", &ledger, DeliverBehavior::Scripted(script)) as Arc<dyn DeliverClient>];
    let mut group = DeliverGroup::new(clients, signer(), "mychannel", "tx1");
    group.connect(Duration::from_secs(1)).await.unwrap();
    group.wait(Duration::from_secs(1)).await.unwrap();
    assert_eq!(group.confirmed(), 1);
}

#[tokio::test]
async fn test_stream_end_and_full_block_are_failures() {
    let ledger = Ledger::new();
    let clients = vec![MockDeliverClient::new(
        "peer0:7051",
        &ledger,
        DeliverBehavior::Scripted(vec![DeliverResponse::Status(Status::NotFound)]),
    ) as Arc<dyn DeliverClient>];
    let mut group = DeliverGroup::new(clients, signer(), "mychannel", "tx1");
    group.connect(Duration::from_secs(1)).await.unwrap();
    let err = group.wait(Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, SdkError::DeliverCompleted { status: Status::NotFound, .. }));

    let block = super::mock::data_block(5, 0);
    let clients = vec![MockDeliverClient::new(
        "peer0:7051",
        &ledger,
        DeliverBehavior::Scripted(vec![DeliverResponse::Block(block)]),
    ) as Arc<dyn DeliverClient>];
    let mut group = DeliverGroup::new(clients, signer(), "mychannel", "tx1");
    group.connect(Duration::from_secs(1)).await.unwrap();
    let err = group.wait(Duration::from_secs(1)).await.unwrap_err();
    assert!(matches!(err, SdkError::UnexpectedDeliverResponse { .. }));
}

#[tokio::test]
async fn test_gateway_waits_on_every_peer() {
    let ledger = Ledger::new();
    let orderer = MockOrderer::new(&ledger);
    let endpoints = endpoints(
        &ledger,
        orderer.clone(),
        vec![
            DeliverBehavior::Commit(TxValidationCode::Valid),
            DeliverBehavior::Commit(TxValidationCode::Valid),
            DeliverBehavior::Commit(TxValidationCode::EndorsementPolicyFailure),
        ],
    )
    .with_timeouts(Timeouts {
        commit_ms: 5_000,
        ..Default::default()
    });
    let gateway = Gateway::new(signer(), endpoints);

    let err = gateway
        .invoke("mychannel", Invocation::new("basic", vec![b"put".to_vec()]))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::TxInvalidated { address, .. } if address == "peer2:7051"));
}

#[tokio::test]
async fn test_connect_deadline() {
    let ledger = Ledger::new();
    let clients = vec![
        MockDeliverClient::new("peer0:7051", &ledger, DeliverBehavior::Silent) as Arc<dyn DeliverClient>,
        MockDeliverClient::new("peer1:7051", &ledger, DeliverBehavior::Stalled) as Arc<dyn DeliverClient>,
    ];
    let mut group = DeliverGroup::new(clients, signer(), "mychannel", "tx1");

    let err = group.connect(Duration::from_millis(50)).await.unwrap_err();
    assert!(matches!(err, SdkError::DeliverTimeout { phase: DeliverPhase::Connect, .. }));
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_connect_fails_on_first_unreachable_peer() {
    let ledger = Ledger::new();
    let clients = vec![
        MockDeliverClient::new("peer0:7051", &ledger, DeliverBehavior::Silent) as Arc<dyn DeliverClient>,
        MockDeliverClient::new("peer1:7051", &ledger, DeliverBehavior::Unreachable) as Arc<dyn DeliverClient>,
        MockDeliverClient::new("peer2:7051", &ledger, DeliverBehavior::Stalled) as Arc<dyn DeliverClient>,
    ];
    let mut group = DeliverGroup::new(clients, signer(), "mychannel", "tx1");

    let started = Instant::now();
    let err = group.connect(Duration::from_secs(10)).await.unwrap_err();
    assert!(matches!(err, SdkError::Transport { address, .. } if address == "peer1:7051"));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_unacknowledged_broadcast_times_out() {
    let ledger = Ledger::new();
    let orderer = MockOrderer::silent(&ledger);
    let endpoints = endpoints(&ledger, orderer.clone(), vec![DeliverBehavior::Commit(TxValidationCode::Valid)])
        .with_timeouts(Timeouts {
            broadcast_ms: 50,
            ..Default::default()
        });

    let err = invoke(&signer(), &endpoints, "mychannel", &put(), Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Timeout { operation: "broadcast", .. }));
    assert!(!err.is_commit_failure());
    assert_eq!(orderer.closes(), 1);
}
