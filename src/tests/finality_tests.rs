//! Notarisation, local recording and distribution

use super::test_helpers::{fully_signed_return, holder_signed_return, logger, network, ScriptedSession};
use crate::errors::FlowError;
use crate::flows::FinalityProtocol;
use crate::ledger::BillingStateStatus;
use crate::services::{FlowSession, RecordRegistry, SessionMessage};

#[tokio::test]
async fn test_finalize_records_on_both_nodes() {
    let net = network();
    let billing = net.issue_billing_state("42", 100);
    let stx = fully_signed_return(&net, &billing);

    let mut sessions = vec![net.holder.transport.open(net.issuer.identity()).await.unwrap()];
    let log = logger();
    let committed = FinalityProtocol::new(&net.holder.hub, &log)
        .finalize(stx.clone(), &mut sessions)
        .await
        .unwrap();

    assert_eq!(committed.id(), stx.id());
    assert!(committed.verify_finalized().is_ok());
    assert_eq!(net.notary.submissions(), 1);
    assert_eq!(net.notary.consumed_by(&billing.state_ref), Some(stx.id()));

    assert!(net.holder.vault.is_consumed(&billing.state_ref));
    assert!(net.holder.vault.transaction(&stx.id()).is_some());
    // The issuer acknowledged, so it has recorded too
    assert!(net.issuer.vault.transaction(&stx.id()).is_some());

    let current = net
        .issuer
        .vault
        .find_unspent_billing_by_id(&billing.state.linear_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.state.status, BillingStateStatus::Returned);
}

#[tokio::test]
async fn test_partially_signed_never_reaches_notary() {
    let net = network();
    let billing = net.issue_billing_state("42", 100);
    let stx = holder_signed_return(&net, &billing);

    let mut sessions =
        vec![ScriptedSession::new(net.issuer.identity().clone(), vec![SessionMessage::Ack]).boxed()];
    let log = logger();
    let result = FinalityProtocol::new(&net.holder.hub, &log)
        .finalize(stx, &mut sessions)
        .await;

    assert!(matches!(result, Err(FlowError::InvalidTransition(_))));
    assert_eq!(net.notary.submissions(), 0);
    assert!(net.holder.vault.is_unspent(&billing.state_ref));
}

#[tokio::test]
async fn test_uncovered_participant_is_invalid() {
    let net = network();
    let billing = net.issue_billing_state("42", 100);
    let stx = fully_signed_return(&net, &billing);

    let mut sessions: Vec<Box<dyn FlowSession>> = Vec::new();
    let log = logger();
    let result = FinalityProtocol::new(&net.holder.hub, &log)
        .finalize(stx, &mut sessions)
        .await;

    assert!(matches!(result, Err(FlowError::InvalidTransition(_))));
    assert_eq!(net.notary.submissions(), 0);
}

#[tokio::test]
async fn test_second_spend_is_consensus_rejected() {
    let net = network();
    let billing = net.issue_billing_state("99", 100);
    let first = fully_signed_return(&net, &billing);
    let second = fully_signed_return(&net, &billing);
    assert_ne!(first.id(), second.id());

    let log = logger();
    let finality = FinalityProtocol::new(&net.holder.hub, &log);
    let mut sessions =
        vec![ScriptedSession::new(net.issuer.identity().clone(), vec![SessionMessage::Ack]).boxed()];
    finality.finalize(first, &mut sessions).await.unwrap();

    let mut sessions =
        vec![ScriptedSession::new(net.issuer.identity().clone(), vec![SessionMessage::Ack]).boxed()];
    let err = finality.finalize(second.clone(), &mut sessions).await.unwrap_err();

    assert_eq!(
        err,
        FlowError::ConsensusRejected {
            conflicts: vec![billing.state_ref]
        }
    );
    assert!(net.holder.vault.transaction(&second.id()).is_none());
}

#[tokio::test]
async fn test_missing_ack_reports_committed_transaction() {
    let net = network();
    let billing = net.issue_billing_state("42", 100);
    let stx = fully_signed_return(&net, &billing);

    let mut sessions =
        vec![ScriptedSession::new(net.issuer.identity().clone(), vec![SessionMessage::Refuse("no".into())]).boxed()];
    let log = logger();
    let result = FinalityProtocol::new(&net.holder.hub, &log)
        .finalize(stx.clone(), &mut sessions)
        .await;

    let err = result.unwrap_err();
    match &err {
        FlowError::DistributionFailed { tx_id, reason } => {
            assert_eq!(*tx_id, stx.id());
            assert!(reason.contains("awaiting acknowledgement"));
        }
        other => panic!("expected distribution failure, got {:?}", other),
    }
    assert!(!err.is_retryable());
    // Notarised regardless; the local record is already written
    assert_eq!(net.notary.consumed_by(&billing.state_ref), Some(stx.id()));
    assert!(net.holder.vault.transaction(&stx.id()).is_some());
    assert!(net.holder.vault.is_consumed(&billing.state_ref));
}
