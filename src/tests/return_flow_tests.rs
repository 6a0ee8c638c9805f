//! Cancelling a return before the notary signs

use super::test_helpers::network;
use crate::ledger::BillingStateStatus;
use crate::services::{FlowSession, RecordRegistry, SessionHandler};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Issuer that takes the session and never answers
struct Silent;

#[async_trait]
impl SessionHandler for Silent {
    async fn handle(&self, _session: Box<dyn FlowSession>) {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}

#[tokio::test]
async fn test_abort_while_awaiting_endorsement_leaves_state_unspent() {
    let net = network();
    let billing = net.issue_billing_state("42", 1_000);
    net.network.register(net.issuer.identity(), Arc::new(Silent));

    let flow = net.holder.return_flow();
    let input = billing.clone();
    let handle = tokio::spawn(async move { flow.call(input).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    assert_eq!(net.network.sessions_opened_to(net.issuer.identity()), 1);
    assert_eq!(net.notary.submissions(), 0);
    assert!(net.holder.vault.is_unspent(&billing.state_ref));
    assert!(net.issuer.vault.is_unspent(&billing.state_ref));
}

#[tokio::test]
async fn test_abort_after_chip_attachment_keeps_attached_version_active() {
    let net = network();
    let billing = net.issue_billing_state("7", 1_000);
    let chip = net.issue_chip(&billing, 25);
    net.network.register(net.issuer.identity(), Arc::new(Silent));

    let flow = net.holder.return_flow();
    let input = billing.clone();
    let handle = tokio::spawn(async move { flow.call(input).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    // Attachment was notarised before the issuer went quiet; the return was not
    assert_eq!(net.notary.submissions(), 1);
    assert!(net.holder.vault.is_consumed(&chip.state_ref));
    let current = net
        .holder
        .vault
        .find_unspent_billing_by_id(&billing.state.linear_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.state.status, BillingStateStatus::Active);
    assert_eq!(current.state.spent, 25);
}

#[tokio::test]
async fn test_return_only_abort_leaves_state_unspent() {
    let net = network();
    let billing = net.issue_billing_state("42", 1_000);
    let chip = net.issue_chip(&billing, 25);
    net.network.register(net.issuer.identity(), Arc::new(Silent));

    let flow = net.holder.return_flow();
    let input = billing.clone();
    let handle = tokio::spawn(async move { flow.return_only(input).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    assert_eq!(net.notary.submissions(), 0);
    assert!(net.holder.vault.is_unspent(&billing.state_ref));
    assert!(net.holder.vault.is_unspent(&chip.state_ref));
}
