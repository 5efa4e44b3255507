//! Structured observability hooks for the flow lifecycle.
//!
//! This module provides:
//! - Request-scoped tracing spans via the `FlowSpan` RAII guard
//! - Emission functions for key lifecycle events: flow start/finish, gate
//!   evaluation, specialist completion, fallback advance
//!
//! Events are emitted at `info!` level; filter with `RUST_LOG` as usual.

use tracing::info;

use crate::domain::plan::FlowState;

/// RAII guard that enters a request-scoped tracing span for the duration of
/// a flow.
pub struct FlowSpan {
    _span: tracing::span::EnteredSpan,
}

impl FlowSpan {
    /// Create and enter a span tagged with the request id.
    pub fn enter(request_id: &str) -> Self {
        let span = tracing::info_span!("hermes.flow", request_id = %request_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: flow started for a query.
pub fn emit_flow_started(request_id: &str, query: &str) {
    info!(event = "flow.started", request_id = %request_id, query = %query);
}

/// Emit event: flow reached a terminal state.
pub fn emit_flow_finished(request_id: &str, state: FlowState, duration_ms: u64, success: bool) {
    info!(
        event = "flow.finished",
        request_id = %request_id,
        state = %state,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: gate evaluation completed with score and verdict.
pub fn emit_gate_evaluated(request_id: &str, score: f32, threshold: f32, passed: bool) {
    info!(
        event = "gate.evaluated",
        request_id = %request_id,
        score = score,
        threshold = threshold,
        passed = passed,
    );
}

/// Emit event: one specialist task reached a terminal outcome.
pub fn emit_specialist_finished(request_id: &str, specialist: &str, success: bool, attempts: u32) {
    info!(
        event = "specialist.finished",
        request_id = %request_id,
        specialist = %specialist,
        success = success,
        attempts = attempts,
    );
}

/// Emit event: flow-level fault (warning level).
pub fn emit_flow_fault(request_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "flow.fault", request_id = %request_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_span_create() {
        // Just ensure FlowSpan::enter doesn't panic
        let _span = FlowSpan::enter("req-1234");
    }
}
