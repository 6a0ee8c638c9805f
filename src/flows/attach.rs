//! Folding unspent chips into their billing state
//!
//! A billing state may only be returned once no chip references it. When
//! chips exist they are consumed in a transaction of their own, which also
//! consumes the billing state version in hand and produces a new one.

use super::builder::StateTransitionBuilder;
use super::finality::FinalityProtocol;
use crate::errors::{FlowError, FlowResult};
use crate::ledger::{BillingState, SignedTransaction, StateAndRef};
use crate::metrics::metrics;
use crate::services::{FlowSession, ServiceHub, SessionTransport};
use crate::structured_logging::FlowLogger;

/// Result of an attachment attempt
#[derive(Debug)]
pub enum AttachOutcome {
    /// No chips were pending; the handle is still the current version
    Unchanged(StateAndRef<BillingState>),
    /// Chips were folded in and committed. The handle passed in has been
    /// consumed; look the billing state up again by linear id.
    Attached(SignedTransaction),
}

impl AttachOutcome {
    pub fn committed(&self) -> Option<&SignedTransaction> {
        match self {
            Self::Attached(stx) => Some(stx),
            Self::Unchanged(_) => None,
        }
    }
}

pub struct ChipAttachmentOrchestrator<'a> {
    hub: &'a ServiceHub,
    transport: &'a dyn SessionTransport,
    logger: &'a FlowLogger,
}

impl<'a> ChipAttachmentOrchestrator<'a> {
    pub fn new(
        hub: &'a ServiceHub,
        transport: &'a dyn SessionTransport,
        logger: &'a FlowLogger,
    ) -> Self {
        Self {
            hub,
            transport,
            logger,
        }
    }

    /// Attach every unspent chip of `billing`, if there are any
    pub async fn attach_unspent_chips(
        &self,
        billing: StateAndRef<BillingState>,
    ) -> FlowResult<AttachOutcome> {
        let chips = self
            .hub
            .registry
            .unspent_chips_for(&billing.state.linear_id)
            .await?;
        if chips.is_empty() {
            self.logger.log_step("no unspent chips");
            return Ok(AttachOutcome::Unchanged(billing));
        }

        let me = self.hub.my_identity();
        if &billing.state.owner != me {
            return Err(FlowError::invalid(format!(
                "only the owner {} can attach chips to {}",
                billing.state.owner, billing.state.linear_id
            )));
        }

        let tx = StateTransitionBuilder::from_hub(self.hub).build_attach_transition(&billing, &chips)?;
        let stx = self.hub.sign_initial_transaction(tx)?;

        // The owner is the only signer; sessions are for distribution
        let mut sessions: Vec<Box<dyn FlowSession>> = Vec::new();
        for party in billing.state.participants() {
            if &party != me {
                sessions.push(self.transport.open(&party).await?);
            }
        }

        let committed = FinalityProtocol::new(self.hub, self.logger)
            .finalize(stx, &mut sessions)
            .await?;

        metrics().chip_attachments.inc();
        self.logger.log_chips_attached(chips.len(), &committed.id());
        Ok(AttachOutcome::Attached(committed))
    }
}
