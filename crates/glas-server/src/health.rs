//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

use crate::websocket::stats::StatsSnapshot;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Sessions currently running.
    pub connections: usize,
    /// Sessions that ended without a fault.
    pub sessions_completed: u64,
    /// Sessions that ended with a fault.
    pub sessions_faulted: u64,
}

/// Build a health response from live session counters.
pub fn health_check(start_time: Instant, stats: &StatsSnapshot) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: stats.active,
        sessions_completed: stats.completed,
        sessions_faulted: stats.faulted,
    }
}
