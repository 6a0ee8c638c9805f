//! Return of a billing state to its issuer
//!
//! ```text
//! START -> ATTACH_CHIPS (optional) -> BUILD_TRANSITION -> COLLECT_SIGNATURES -> FINALIZE -> DONE
//! ```
//!
//! Any failure aborts the whole flow. Nothing is written anywhere before the
//! notary signs, so an aborted or cancelled flow leaves the input spendable.

use super::attach::{AttachOutcome, ChipAttachmentOrchestrator};
use super::builder::StateTransitionBuilder;
use super::collect::SignatureCollectionProtocol;
use super::finality::FinalityProtocol;
use crate::errors::{FlowError, FlowResult};
use crate::ledger::{BillingState, SignedTransaction, StateAndRef};
use crate::metrics::{metrics, Timer};
use crate::observability::TraceContext;
use crate::services::{FlowSession, ServiceHub, SessionTransport};
use crate::structured_logging::FlowLogger;
use std::sync::Arc;
use tracing::Instrument;

/// Returned billing state and the transaction that committed it
pub type ReturnOutcome = (BillingState, SignedTransaction);

#[derive(Clone)]
pub struct ReturnBillingStateFlow {
    hub: ServiceHub,
    transport: Arc<dyn SessionTransport>,
}

impl ReturnBillingStateFlow {
    pub fn new(hub: ServiceHub, transport: Arc<dyn SessionTransport>) -> Self {
        Self { hub, transport }
    }

    /// Attach any unspent chips, then return the billing state
    pub async fn call(&self, billing_state: StateAndRef<BillingState>) -> FlowResult<ReturnOutcome> {
        self.instrumented("attach_chips_and_return", billing_state, true)
            .await
    }

    /// Return the billing state as is; the caller has already dealt with
    /// chips
    pub async fn return_only(
        &self,
        billing_state: StateAndRef<BillingState>,
    ) -> FlowResult<ReturnOutcome> {
        self.instrumented("return_billing_state", billing_state, false)
            .await
    }

    async fn instrumented(
        &self,
        operation: &str,
        billing_state: StateAndRef<BillingState>,
        attach_chips: bool,
    ) -> FlowResult<ReturnOutcome> {
        let trace = TraceContext::new(operation, &billing_state.state.linear_id);
        let span = trace.span();
        let logger = FlowLogger::new(trace);
        logger.log_flow_started();
        metrics().flows_started.inc();
        let timer = Timer::new();

        let result = self
            .run(billing_state, attach_chips, &logger)
            .instrument(span)
            .await;

        match &result {
            Ok((_, stx)) => {
                timer.observe_duration(&metrics().flow_latency);
                metrics().flows_committed.inc();
                logger.log_committed(&stx.id(), timer.elapsed_ms());
            }
            Err(e) => {
                metrics().record_failure(e.category());
                logger.log_failure(e.category(), &e.to_string());
            }
        }
        result
    }

    async fn run(
        &self,
        billing_state: StateAndRef<BillingState>,
        attach_chips: bool,
        logger: &FlowLogger,
    ) -> FlowResult<ReturnOutcome> {
        // START: returned is terminal, refuse before touching anything
        if !billing_state.state.is_active() {
            return Err(FlowError::invalid(format!(
                "billing state {} has already been returned",
                billing_state.state.linear_id
            )));
        }

        // ATTACH_CHIPS
        let current = if attach_chips {
            let linear_id = billing_state.state.linear_id.clone();
            let attach_logger = FlowLogger::new(logger.trace().child_span("attach_chips"));
            let orchestrator =
                ChipAttachmentOrchestrator::new(&self.hub, self.transport.as_ref(), &attach_logger);
            match orchestrator.attach_unspent_chips(billing_state).await? {
                AttachOutcome::Unchanged(current) => current,
                AttachOutcome::Attached(_) => self
                    .hub
                    .registry
                    .find_unspent_billing_by_id(&linear_id)
                    .await?
                    .ok_or_else(|| FlowError::RecordNotFound(linear_id.clone()))?,
            }
        } else {
            billing_state
        };

        // BUILD_TRANSITION
        logger.log_step("build_transition");
        let tx = StateTransitionBuilder::from_hub(&self.hub).build_return_transition(&current)?;
        let output = tx
            .outputs
            .first()
            .and_then(|o| o.as_billing())
            .cloned()
            .ok_or_else(|| FlowError::internal("return transaction has no billing output"))?;
        let stx = self.hub.sign_initial_transaction(tx)?;

        // COLLECT_SIGNATURES
        let collect_logger = FlowLogger::new(logger.trace().child_span("collect_signatures"));
        let session = self.transport.open(&current.state.issuer).await?;
        let mut sessions: Vec<Box<dyn FlowSession>> = vec![session];
        let fully_signed = SignatureCollectionProtocol::new(&self.hub, &collect_logger)
            .collect(stx, &mut sessions)
            .await?;

        // FINALIZE
        let finality_logger = FlowLogger::new(logger.trace().child_span("finality"));
        let committed = FinalityProtocol::new(&self.hub, &finality_logger)
            .finalize(fully_signed, &mut sessions)
            .await?;

        Ok((output, committed))
    }
}
