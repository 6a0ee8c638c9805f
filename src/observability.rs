//! Trace context of one flow invocation
//!
//! The flow creates the root context for the billing state it works on;
//! each sub-protocol runs under a `child_span`, so attach, collect and
//! finality events share one trace id and one linear id.

use crate::ledger::UniqueIdentifier;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TraceContext {
    trace_id: String,
    span_id: String,
    parent_span_id: Option<String>,
    flow: String,
    step: Option<String>,
    linear_id: UniqueIdentifier,
}

impl TraceContext {
    pub fn new(flow: &str, linear_id: &UniqueIdentifier) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: None,
            flow: flow.to_string(),
            step: None,
            linear_id: linear_id.clone(),
        }
    }

    /// Context for one step of the same invocation
    pub fn child_span(&self, step: &str) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: Uuid::new_v4().to_string(),
            parent_span_id: Some(self.span_id.clone()),
            flow: self.flow.clone(),
            step: Some(step.to_string()),
            linear_id: self.linear_id.clone(),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn parent_span_id(&self) -> Option<&str> {
        self.parent_span_id.as_deref()
    }

    pub fn flow(&self) -> &str {
        &self.flow
    }

    pub fn step(&self) -> Option<&str> {
        self.step.as_deref()
    }

    pub fn linear_id(&self) -> &UniqueIdentifier {
        &self.linear_id
    }

    /// `tracing` span the invocation is instrumented with
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "flow",
            flow = %self.flow,
            trace_id = %self.trace_id,
            linear_id = %self.linear_id,
        )
    }
}
