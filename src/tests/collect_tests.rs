//! Endorsement collection against scripted counter-parties

use super::test_helpers::{holder_signed_return, logger, network, ScriptedSession};
use crate::errors::FlowError;
use crate::flows::SignatureCollectionProtocol;
use crate::ledger::{KeyPair, Party, SignedTransaction, TransactionSignature};
use crate::services::{FlowSession, SessionMessage};

#[tokio::test]
async fn test_collects_issuer_endorsement() {
    let net = network();
    let billing = net.issue_billing_state("42", 100);
    let stx = holder_signed_return(&net, &billing);
    let issuer_sig = net.issuer.hub.create_signature(&stx);

    let session = ScriptedSession::new(
        net.issuer.identity().clone(),
        vec![SessionMessage::Endorse(issuer_sig)],
    );
    let sent = session.sent_log();
    let mut sessions = vec![session.boxed()];

    let log = logger();
    let signed = SignatureCollectionProtocol::new(&net.holder.hub, &log)
        .collect(stx.clone(), &mut sessions)
        .await
        .unwrap();

    assert!(signed.verify_required_signatures_except(&[]).is_ok());
    assert!(signed.is_signed_by(&net.issuer.identity().owning_key));
    assert_eq!(signed.id(), stx.id());
    assert_eq!(*sent.lock(), vec![SessionMessage::Propose(stx)]);
}

#[tokio::test]
async fn test_refusal_is_endorsement_refused() {
    let net = network();
    let billing = net.issue_billing_state("42", 100);
    let stx = holder_signed_return(&net, &billing);

    let mut sessions = vec![ScriptedSession::new(
        net.issuer.identity().clone(),
        vec![SessionMessage::Refuse("not today".to_string())],
    )
    .boxed()];

    let log = logger();
    let err = SignatureCollectionProtocol::new(&net.holder.hub, &log)
        .collect(stx, &mut sessions)
        .await
        .unwrap_err();
    match err {
        FlowError::EndorsementRefused { party, reason } => {
            assert_eq!(party, net.issuer.identity().name);
            assert_eq!(reason, "not today");
        }
        other => panic!("expected refusal, got {:?}", other),
    }
}

#[tokio::test]
async fn test_foreign_key_endorsement_is_refused() {
    let net = network();
    let billing = net.issue_billing_state("42", 100);
    let stx = holder_signed_return(&net, &billing);
    let forged = TransactionSignature::create(&KeyPair::generate(), &stx.id());

    let mut sessions = vec![ScriptedSession::new(
        net.issuer.identity().clone(),
        vec![SessionMessage::Endorse(forged)],
    )
    .boxed()];

    let log = logger();
    let result = SignatureCollectionProtocol::new(&net.holder.hub, &log)
        .collect(stx, &mut sessions)
        .await;
    assert!(matches!(result, Err(FlowError::EndorsementRefused { .. })));
}

#[tokio::test]
async fn test_unexpected_reply_is_session_failure() {
    let net = network();
    let billing = net.issue_billing_state("42", 100);
    let stx = holder_signed_return(&net, &billing);

    let mut sessions = vec![
        ScriptedSession::new(net.issuer.identity().clone(), vec![SessionMessage::Ack]).boxed(),
    ];

    let log = logger();
    let result = SignatureCollectionProtocol::new(&net.holder.hub, &log)
        .collect(stx, &mut sessions)
        .await;
    assert!(matches!(result, Err(FlowError::SessionFailure { .. })));
}

#[tokio::test]
async fn test_closed_session_is_session_failure() {
    let net = network();
    let billing = net.issue_billing_state("42", 100);
    let stx = holder_signed_return(&net, &billing);

    let mut sessions = vec![ScriptedSession::new(net.issuer.identity().clone(), vec![]).boxed()];

    let log = logger();
    let result = SignatureCollectionProtocol::new(&net.holder.hub, &log)
        .collect(stx, &mut sessions)
        .await;
    assert!(matches!(result, Err(FlowError::SessionFailure { .. })));
}

#[tokio::test]
async fn test_unsigned_proposal_never_sent() {
    let net = network();
    let billing = net.issue_billing_state("42", 100);
    let unsigned = SignedTransaction {
        tx: holder_signed_return(&net, &billing).tx,
        sigs: Vec::new(),
    };

    let session = ScriptedSession::new(net.issuer.identity().clone(), vec![]);
    let sent = session.sent_log();
    let mut sessions = vec![session.boxed()];

    let log = logger();
    let result = SignatureCollectionProtocol::new(&net.holder.hub, &log)
        .collect(unsigned, &mut sessions)
        .await;
    assert!(matches!(result, Err(FlowError::InvalidTransition(_))));
    assert!(sent.lock().is_empty());
}

#[tokio::test]
async fn test_missing_session_for_signer_is_invalid() {
    let net = network();
    let billing = net.issue_billing_state("42", 100);
    let stx = holder_signed_return(&net, &billing);
    let mut sessions: Vec<Box<dyn FlowSession>> = Vec::new();

    let log = logger();
    let result = SignatureCollectionProtocol::new(&net.holder.hub, &log)
        .collect(stx, &mut sessions)
        .await;
    assert!(matches!(result, Err(FlowError::InvalidTransition(_))));
}

#[tokio::test]
async fn test_session_to_non_signer_is_invalid() {
    let net = network();
    let billing = net.issue_billing_state("42", 100);
    let stx = holder_signed_return(&net, &billing);
    let stranger = Party::new("O=Stranger", KeyPair::generate().public_key());

    let session = ScriptedSession::new(stranger, vec![]);
    let sent = session.sent_log();
    let mut sessions = vec![
        ScriptedSession::new(net.issuer.identity().clone(), vec![]).boxed(),
        session.boxed(),
    ];

    let log = logger();
    let result = SignatureCollectionProtocol::new(&net.holder.hub, &log)
        .collect(stx, &mut sessions)
        .await;
    assert!(matches!(result, Err(FlowError::InvalidTransition(_))));
    assert!(sent.lock().is_empty());
}

#[tokio::test]
async fn test_duplicate_session_is_invalid() {
    let net = network();
    let billing = net.issue_billing_state("42", 100);
    let stx = holder_signed_return(&net, &billing);
    let issuer_sig = net.issuer.hub.create_signature(&stx);

    let first = ScriptedSession::new(
        net.issuer.identity().clone(),
        vec![SessionMessage::Endorse(issuer_sig.clone())],
    );
    let second = ScriptedSession::new(
        net.issuer.identity().clone(),
        vec![SessionMessage::Endorse(issuer_sig)],
    );
    let first_sent = first.sent_log();
    let second_sent = second.sent_log();
    let mut sessions = vec![first.boxed(), second.boxed()];

    let log = logger();
    let err = SignatureCollectionProtocol::new(&net.holder.hub, &log)
        .collect(stx, &mut sessions)
        .await
        .unwrap_err();
    match err {
        FlowError::InvalidTransition(reason) => {
            assert!(reason.starts_with("more than one session to"));
        }
        other => panic!("expected invalid transition, got {:?}", other),
    }
    assert!(first_sent.lock().is_empty());
    assert!(second_sent.lock().is_empty());
}
