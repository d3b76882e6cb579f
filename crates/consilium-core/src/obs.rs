//! Structured observability hooks for request lifecycle events.
//!
//! This module provides:
//! - Request-scoped tracing spans via the `RequestSpan` RAII guard
//! - Emission functions for detection, dispatch, pool and synthesis events
//!
//! Events are emitted at `info!` level; filter them with `RUST_LOG`.

use std::future::Future;
use std::time::Duration;

use tracing::info;
use tracing::instrument::Instrumented;

/// Request-scoped span.
///
/// Async work runs inside it through [`RequestSpan::instrument`], which keeps
/// the future `Send` and re-enters the span on every poll.
///
/// # Example
///
/// ```ignore
/// let span = RequestSpan::new("0b6f…");
/// span.instrument(async { /* events carry request_id = "0b6f…" */ }).await;
/// ```
#[derive(Debug, Clone)]
pub struct RequestSpan {
    span: tracing::Span,
}

impl RequestSpan {
    pub fn new(request_id: &str) -> Self {
        Self {
            span: tracing::info_span!("consilium.request", request_id = %request_id),
        }
    }

    pub fn instrument<F: Future>(&self, future: F) -> Instrumented<F> {
        use tracing::instrument::Instrument;
        future.instrument(self.span.clone())
    }

    /// Enter the span for synchronous code.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

/// Emit event: a batch is about to be dispatched.
pub fn emit_request_started(roles: &[String]) {
    info!(event = "request.started", roles = ?roles);
}

/// Emit event: detection produced a selection.
///
/// `source` is `model` or `fallback`.
pub fn emit_detection_completed(source: &str, roles: &[String]) {
    info!(event = "detection.completed", source = %source, roles = ?roles);
}

pub fn emit_role_dispatched(role: &str) {
    info!(event = "dispatch.role_started", role = %role);
}

/// Emit event: a role's final outcome (`completed`, `failed` or `timed_out`).
pub fn emit_role_finished(role: &str, outcome: &str) {
    info!(event = "dispatch.role_finished", role = %role, outcome = %outcome);
}

/// Emit event: the batch deadline elapsed with tasks outstanding (warning level).
pub fn emit_deadline_elapsed(outstanding: usize, deadline: Duration) {
    tracing::warn!(
        event = "dispatch.deadline_elapsed",
        outstanding = outstanding,
        deadline_secs = deadline.as_secs(),
    );
}

pub fn emit_pool_transition(from: &str, to: &str, generation: u64) {
    info!(
        event = "pool.transition",
        from = %from,
        to = %to,
        generation = generation,
    );
}

pub fn emit_synthesis_finished(contributions: usize, success: bool) {
    info!(
        event = "synthesis.finished",
        contributions = contributions,
        success = success,
    );
}

/// Emit event: request finished with duration, entry count and success.
pub fn emit_request_finished(duration_ms: u64, entries: usize, success: bool) {
    info!(
        event = "request.finished",
        duration_ms = duration_ms,
        entries = entries,
        success = success,
    );
}
