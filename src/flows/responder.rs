//! Issuer side of the billing flows
//!
//! Endorses return proposals it agrees with and records every finalized
//! transaction it is sent. A session may open straight with a finalized
//! transaction, which is how chip attachments reach the issuer.

use crate::ledger::{Party, SignedTransaction};
use crate::services::{FlowSession, ServiceHub, SessionHandler, SessionMessage};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Extra local check applied to proposals after the contract passes
pub type AcceptancePolicy = Arc<dyn Fn(&SignedTransaction) -> Result<(), String> + Send + Sync>;

#[derive(Clone)]
pub struct IssuerResponder {
    hub: ServiceHub,
    policy: Option<AcceptancePolicy>,
}

impl IssuerResponder {
    pub fn new(hub: ServiceHub) -> Self {
        Self { hub, policy: None }
    }

    pub fn with_policy(mut self, policy: AcceptancePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// `Err(reason)` if this node will not endorse the proposal
    fn check_proposal(&self, stx: &SignedTransaction, proposer: &Party) -> Result<(), String> {
        if &stx.tx.notary != self.hub.notary_identity() {
            return Err(format!("unexpected notary {}", stx.tx.notary));
        }
        self.hub.contract.validate(&stx.tx)?;

        let me = self.hub.my_identity().owning_key;
        if !stx.tx.required_signers().contains(&me) {
            return Err("this node is not a required signer".to_string());
        }
        if stx.is_signed_by(&me) {
            return Err("proposal already carries this node's signature".to_string());
        }
        if !stx.is_signed_by(&proposer.owning_key) {
            return Err(format!("proposal is not signed by {}", proposer));
        }
        let required = stx.tx.required_signers().to_vec();
        stx.verify_required_signatures_except(&required)
            .map_err(|e| e.to_string())?;

        match &self.policy {
            Some(policy) => (policy.as_ref())(stx),
            None => Ok(()),
        }
    }

    fn check_finalized(&self, stx: &SignedTransaction) -> Result<(), String> {
        if &stx.tx.notary != self.hub.notary_identity() {
            return Err(format!("unexpected notary {}", stx.tx.notary));
        }
        self.hub.contract.validate(&stx.tx)?;
        stx.verify_finalized().map_err(|e| e.to_string())
    }

    async fn endorse(&self, session: &mut dyn FlowSession, proposal: SignedTransaction) {
        let proposer = session.counterparty().clone();
        if let Err(reason) = self.check_proposal(&proposal, &proposer) {
            warn!(from = %proposer, tx_id = %proposal.id(), reason = %reason, "Refusing to endorse");
            let _ = session.send(SessionMessage::Refuse(reason)).await;
            return;
        }

        let sig = self.hub.create_signature(&proposal);
        if session.send(SessionMessage::Endorse(sig)).await.is_err() {
            return;
        }
        debug!(from = %proposer, tx_id = %proposal.id(), "Endorsed proposal");

        match session.receive().await {
            Ok(SessionMessage::Finalized(stx)) if stx.id() == proposal.id() => {
                self.record(session, stx).await;
            }
            Ok(other) => {
                warn!(from = %proposer, kind = other.kind(), "Expected the finalized proposal");
            }
            // Initiator gave up, e.g. the notary rejected the transaction
            Err(e) => debug!(from = %proposer, error = %e, "Session ended before finality"),
        }
    }

    async fn record(&self, session: &mut dyn FlowSession, stx: SignedTransaction) {
        if let Err(reason) = self.check_finalized(&stx) {
            warn!(tx_id = %stx.id(), reason = %reason, "Rejected finalized transaction");
            return;
        }
        if let Err(e) = self.hub.registry.record_transaction(&stx).await {
            warn!(tx_id = %stx.id(), error = %e, "Failed to record transaction");
            return;
        }
        info!(
            node = %self.hub.my_identity(),
            tx_id = %stx.id(),
            command = %stx.tx.command.kind,
            "Recorded finalized transaction"
        );
        let _ = session.send(SessionMessage::Ack).await;
    }
}

#[async_trait]
impl SessionHandler for IssuerResponder {
    async fn handle(&self, mut session: Box<dyn FlowSession>) {
        match session.receive().await {
            Ok(SessionMessage::Propose(stx)) => self.endorse(session.as_mut(), stx).await,
            Ok(SessionMessage::Finalized(stx)) => self.record(session.as_mut(), stx).await,
            Ok(other) => warn!(
                from = %session.counterparty(),
                kind = other.kind(),
                "Unexpected opening message"
            ),
            Err(e) => debug!(error = %e, "Session closed before first message"),
        }
    }
}
