//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup, before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across crates.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Rejected upgrade attempts (counter, labels: reason).
pub const WS_UPGRADE_REJECTIONS_TOTAL: &str = "ws_upgrade_rejections_total";
/// Sessions ending in a fault (counter, labels: kind).
pub const WS_SESSION_FAULTS_TOTAL: &str = "ws_session_faults_total";
/// Session duration seconds (histogram).
pub const WS_SESSION_DURATION_SECONDS: &str = "ws_session_duration_seconds";
/// Client frames forwarded to engines (counter).
pub const WS_FRAMES_IN_TOTAL: &str = "ws_frames_in_total";
/// Typed messages sent to clients (counter, labels: type).
pub const WS_MESSAGES_OUT_TOTAL: &str = "ws_messages_out_total";
/// Session tasks aborted after the teardown bound (counter).
pub const WS_TEARDOWN_ABORTS_TOTAL: &str = "ws_teardown_aborts_total";
