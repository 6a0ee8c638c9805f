//! Notarisation and distribution of a fully endorsed transaction
//!
//! This is the commit point. Until the notary signs, nothing is final and
//! every input stays spendable; once it signs, the inputs are retired for
//! good and the result is recorded locally and pushed to every session.

use crate::errors::{FlowError, FlowResult};
use crate::ledger::{PublicKey, SignedTransaction};
use crate::metrics::{metrics, Timer};
use crate::services::{FlowSession, ServiceHub, SessionMessage};
use crate::structured_logging::FlowLogger;
use futures::future::try_join_all;
use std::collections::BTreeSet;

pub struct FinalityProtocol<'a> {
    hub: &'a ServiceHub,
    logger: &'a FlowLogger,
}

impl<'a> FinalityProtocol<'a> {
    pub fn new(hub: &'a ServiceHub, logger: &'a FlowLogger) -> Self {
        Self { hub, logger }
    }

    /// Notarise `stx`, record it and distribute it to every session
    ///
    /// A double spend surfaces unchanged as [`FlowError::ConsensusRejected`].
    /// Once the notary has signed, a counter-party that fails to acknowledge
    /// yields [`FlowError::DistributionFailed`] naming the committed id.
    pub async fn finalize(
        &self,
        stx: SignedTransaction,
        sessions: &mut [Box<dyn FlowSession>],
    ) -> FlowResult<SignedTransaction> {
        stx.verify_required_signatures_except(&[])
            .map_err(|e| FlowError::invalid(format!("transaction is not fully endorsed: {}", e)))?;
        if &stx.tx.notary != self.hub.notary_identity() {
            return Err(FlowError::invalid(format!(
                "transaction names notary {} but this node uses {}",
                stx.tx.notary,
                self.hub.notary_identity()
            )));
        }
        self.check_sessions_cover_participants(&stx, sessions)?;

        let timer = Timer::new();
        self.logger.log_step("notarise");
        let notary_sig = self.hub.notary.notarise(&stx).await?;
        let notarised = stx
            .with_signature(notary_sig)
            .map_err(|e| FlowError::internal(format!("notary signature rejected: {}", e)))?;

        self.hub.registry.record_transaction(&notarised).await?;

        self.logger.log_step("distribute");
        let notarised_ref = &notarised;
        try_join_all(
            sessions
                .iter_mut()
                .map(|session| distribute(session.as_mut(), notarised_ref)),
        )
        .await
        .map_err(|e| FlowError::DistributionFailed {
            tx_id: notarised.id(),
            reason: e.to_string(),
        })?;
        timer.observe_duration(&metrics().finality_latency);

        Ok(notarised)
    }

    fn check_sessions_cover_participants(
        &self,
        stx: &SignedTransaction,
        sessions: &[Box<dyn FlowSession>],
    ) -> FlowResult<()> {
        let me = self.hub.my_identity().owning_key;
        let participants: BTreeSet<PublicKey> = stx
            .tx
            .inputs
            .iter()
            .flat_map(|i| i.state.participants())
            .chain(stx.tx.outputs.iter().flat_map(|o| o.participants()))
            .map(|p| p.owning_key)
            .filter(|k| *k != me)
            .collect();
        let covered: BTreeSet<PublicKey> = sessions
            .iter()
            .map(|s| s.counterparty().owning_key)
            .collect();
        let missing: Vec<&PublicKey> = participants.difference(&covered).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(FlowError::invalid(format!(
                "no session for participants {:?}",
                missing
            )))
        }
    }
}

async fn distribute(session: &mut dyn FlowSession, notarised: &SignedTransaction) -> FlowResult<()> {
    session
        .send(SessionMessage::Finalized(notarised.clone()))
        .await?;
    match session.receive().await? {
        SessionMessage::Ack => Ok(()),
        other => Err(FlowError::session(
            session.counterparty(),
            format!("unexpected {} message while awaiting acknowledgement", other.kind()),
        )),
    }
}
