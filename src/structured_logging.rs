//! Structured flow events

use crate::ledger::SecureHash;
use crate::observability::TraceContext;

/// Emits the canonical events of a flow invocation, tagged with its trace
#[derive(Debug, Clone)]
pub struct FlowLogger {
    trace: TraceContext,
}

impl FlowLogger {
    pub fn new(trace: TraceContext) -> Self {
        Self { trace }
    }

    pub fn trace(&self) -> &TraceContext {
        &self.trace
    }

    pub fn log_flow_started(&self) {
        tracing::info!(
            trace_id = %self.trace.trace_id(),
            flow = %self.trace.flow(),
            linear_id = %self.trace.linear_id(),
            "Flow started"
        );
    }

    pub fn log_step(&self, step: &str) {
        tracing::debug!(
            trace_id = %self.trace.trace_id(),
            span_id = %self.trace.span_id(),
            parent_span_id = ?self.trace.parent_span_id(),
            within = ?self.trace.step(),
            step = %step,
            "Flow step"
        );
    }

    pub fn log_chips_attached(&self, chips: usize, tx_id: &SecureHash) {
        tracing::info!(
            trace_id = %self.trace.trace_id(),
            linear_id = %self.trace.linear_id(),
            chips = chips,
            tx_id = %tx_id,
            "Unspent chips attached"
        );
    }

    pub fn log_endorsement(&self, party: &str, accepted: bool) {
        if accepted {
            tracing::debug!(
                trace_id = %self.trace.trace_id(),
                party = %party,
                "Endorsement received"
            );
        } else {
            tracing::warn!(
                trace_id = %self.trace.trace_id(),
                party = %party,
                "Endorsement refused"
            );
        }
    }

    pub fn log_committed(&self, tx_id: &SecureHash, latency_ms: u64) {
        tracing::info!(
            trace_id = %self.trace.trace_id(),
            linear_id = %self.trace.linear_id(),
            tx_id = %tx_id,
            latency_ms = latency_ms,
            "Transaction committed"
        );
    }

    pub fn log_failure(&self, category: &str, error: &str) {
        tracing::warn!(
            trace_id = %self.trace.trace_id(),
            linear_id = %self.trace.linear_id(),
            category = %category,
            error = %error,
            "Flow failed"
        );
    }
}
