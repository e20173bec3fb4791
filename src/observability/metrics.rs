//! Metrics collection for `knockgate`.
//!
//! Prometheus-compatible metrics with typed recording helpers. Every helper
//! silently no-ops until [`init_metrics`] installs a recorder.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::KnockGateError;
use crate::gate::stage::Stage;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Maximum length for labels taken from configuration.
const MAX_LABEL_LEN: usize = 64;

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `KnockGateError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), KnockGateError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| KnockGateError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "knockgate_stage_transitions_total",
        "Forward stage transitions by target stage"
    );
    describe_gauge!("knockgate_current_stage", "Stage of the live attempt (0-6)");
    describe_counter!("knockgate_resets_total", "Attempt resets by failure kind");
    describe_counter!(
        "knockgate_activations_total",
        "Verification calls by outcome"
    );
    describe_histogram!(
        "knockgate_burst_tally",
        "Clicks counted when the burst window closed"
    );
    describe_counter!(
        "knockgate_fragment_swaps_total",
        "Fragments replaced by the refresh collaborator"
    );
    describe_counter!(
        "knockgate_refresh_reconnects_total",
        "Push stream reconnects"
    );
}

/// Records a forward stage transition and updates the current-stage gauge.
pub fn record_stage_transition(to: Stage) {
    counter!("knockgate_stage_transitions_total", "to" => to.as_str()).increment(1);
    set_current_stage(to);
}

/// Sets the current-stage gauge.
pub fn set_current_stage(stage: Stage) {
    gauge!("knockgate_current_stage").set(f64::from(stage.index()));
}

/// Records a reset.
pub fn record_reset(reason: &'static str) {
    counter!("knockgate_resets_total", "reason" => reason).increment(1);
}

/// Records a verification call outcome.
pub fn record_activation(success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("knockgate_activations_total", "status" => status).increment(1);
}

/// Records the final burst tally.
#[allow(clippy::cast_precision_loss)]
pub fn record_burst_tally(tally: usize) {
    histogram!("knockgate_burst_tally").record(tally as f64);
}

/// Records a fragment swap for a container.
pub fn record_fragment_swap(container: &str) {
    counter!("knockgate_fragment_swaps_total", "container" => sanitize_label(container))
        .increment(1);
}

/// Records a push stream reconnect.
pub fn record_refresh_reconnect() {
    counter!("knockgate_refresh_reconnects_total").increment(1);
}

/// Truncates a configuration-derived label and replaces characters that
/// are invalid in Prometheus labels.
fn sanitize_label(name: &str) -> String {
    name.chars()
        .take(MAX_LABEL_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_label_replaces_and_truncates() {
        assert_eq!(sanitize_label("server-list"), "server-list");
        assert_eq!(sanitize_label("a b/c"), "a_b_c");
        assert_eq!(sanitize_label(&"x".repeat(200)).len(), MAX_LABEL_LEN);
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_stage_transition(Stage::Burst);
        set_current_stage(Stage::Idle);
        record_reset("timing_violation");
        record_activation(true);
        record_burst_tally(185);
        record_fragment_swap("downtime-table");
        record_refresh_reconnect();
    }
}
