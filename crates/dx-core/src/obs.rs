//! Structured observability hooks for the run reporting lifecycle.
//!
//! - `RunSpan` ties every diagnostic for one run to its reference id
//! - `emit_*` functions name the lifecycle events so log queries stay stable
//!
//! Verbosity follows `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use tracing::{info, warn};

/// RAII guard that enters a run-scoped tracing span.
///
/// ```ignore
/// let _span = RunSpan::enter("example/job #42");
/// // every event below carries run = "example/job #42"
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(reference_id: &str) -> Self {
        let span = tracing::info_span!("dx.run", run = %reference_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a run produced no report.
pub fn emit_event_skipped(reference_id: &str, reason: &dyn std::fmt::Display) {
    info!(event = "event.skipped", run = %reference_id, reason = %reason);
}

/// Emit event: a report was accepted by the gateway.
pub fn emit_event_delivered(reference_id: &str, status: &str, pipeline_source: &str) {
    info!(
        event = "event.delivered",
        run = %reference_id,
        status = %status,
        pipeline_source = %pipeline_source,
    );
}

/// Emit event: the gateway failed to deliver a report (warning level).
pub fn emit_delivery_failed(reference_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "event.delivery_failed", run = %reference_id, error = %error);
}

/// Emit event: the host mapping table was (re)built.
pub fn emit_host_mapping_loaded(resource: &str, entries: usize) {
    info!(event = "host_mapping.loaded", resource = %resource, entries = entries);
}
