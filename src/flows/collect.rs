//! Counter-party endorsement collection
//!
//! The initiator's own signature must already be on the transaction; only
//! then is it sent out. All sessions are asked concurrently and the step
//! completes when every one of them has answered or one has failed.

use crate::errors::{FlowError, FlowResult};
use crate::ledger::{PublicKey, SignatureError, SignedTransaction, TransactionSignature};
use crate::metrics::{metrics, Timer};
use crate::services::{FlowSession, ServiceHub, SessionMessage};
use crate::structured_logging::FlowLogger;
use futures::future::try_join_all;
use std::collections::BTreeSet;

pub struct SignatureCollectionProtocol<'a> {
    hub: &'a ServiceHub,
    logger: &'a FlowLogger,
}

impl<'a> SignatureCollectionProtocol<'a> {
    pub fn new(hub: &'a ServiceHub, logger: &'a FlowLogger) -> Self {
        Self { hub, logger }
    }

    /// Gather one endorsement from every required signer reachable through
    /// `sessions`
    pub async fn collect(
        &self,
        partially_signed: SignedTransaction,
        sessions: &mut [Box<dyn FlowSession>],
    ) -> FlowResult<SignedTransaction> {
        self.check_before_sending(&partially_signed, sessions)?;

        let timer = Timer::new();
        let stx = &partially_signed;
        let endorsements = try_join_all(
            sessions
                .iter_mut()
                .map(|session| request_endorsement(session.as_mut(), stx, self.logger)),
        )
        .await?;
        timer.observe_duration(&metrics().endorsement_latency);

        let mut stx = partially_signed;
        for (party, sig) in endorsements {
            stx = stx
                .with_signature(sig)
                .map_err(|e| FlowError::refused(&party, e.to_string()))?;
            metrics().endorsements_collected.inc();
        }

        stx.verify_required_signatures_except(&[]).map_err(|e| match e {
            SignatureError::Missing(keys) => {
                FlowError::refused("counter-parties", format!("missing endorsements from {:?}", keys))
            }
            other => FlowError::refused("counter-parties", other.to_string()),
        })?;
        Ok(stx)
    }

    /// Local preconditions: own signature present and valid, one session per
    /// remaining required signer
    fn check_before_sending(
        &self,
        stx: &SignedTransaction,
        sessions: &[Box<dyn FlowSession>],
    ) -> FlowResult<()> {
        let me = self.hub.my_identity().owning_key;
        if !stx.is_signed_by(&me) {
            return Err(FlowError::invalid(
                "transaction must carry the initiator's signature before collection",
            ));
        }
        let required = stx.tx.required_signers().to_vec();
        stx.verify_required_signatures_except(&required)
            .map_err(|e| FlowError::invalid(e.to_string()))?;

        let mut session_keys = BTreeSet::new();
        for session in sessions {
            let key = session.counterparty().owning_key;
            if key == me {
                return Err(FlowError::invalid("cannot open a signing session to ourselves"));
            }
            if !required.contains(&key) {
                return Err(FlowError::invalid(format!(
                    "{} is not a required signer",
                    session.counterparty()
                )));
            }
            if !session_keys.insert(key) {
                return Err(FlowError::invalid(format!(
                    "more than one session to {}",
                    session.counterparty()
                )));
            }
        }

        let unreachable: Vec<PublicKey> = required
            .iter()
            .filter(|k| !stx.is_signed_by(k) && !session_keys.contains(*k))
            .copied()
            .collect();
        if !unreachable.is_empty() {
            return Err(FlowError::invalid(format!(
                "no session for required signers {:?}",
                unreachable
            )));
        }
        Ok(())
    }
}

async fn request_endorsement(
    session: &mut dyn FlowSession,
    stx: &SignedTransaction,
    logger: &FlowLogger,
) -> FlowResult<(String, TransactionSignature)> {
    let party = session.counterparty().clone();
    session.send(SessionMessage::Propose(stx.clone())).await?;

    match session.receive().await? {
        SessionMessage::Endorse(sig) if sig.by == party.owning_key => {
            logger.log_endorsement(&party.name, true);
            Ok((party.name, sig))
        }
        SessionMessage::Endorse(sig) => Err(FlowError::refused(
            &party,
            format!("endorsement made with foreign key {}", sig.by),
        )),
        SessionMessage::Refuse(reason) => {
            logger.log_endorsement(&party.name, false);
            Err(FlowError::refused(&party, reason))
        }
        other => Err(FlowError::session(
            &party,
            format!("unexpected {} message while awaiting endorsement", other.kind()),
        )),
    }
}
