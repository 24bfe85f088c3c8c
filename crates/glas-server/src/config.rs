//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the gateway server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Prefix for the connect and ready routes (default `"/api"`).
    pub route_prefix: String,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Bound on session teardown before remaining tasks are aborted.
    pub teardown_timeout_ms: u64,
    /// Plain-text frame sent to the client as a session closes.
    pub close_notice: String,
    /// Allowed `Origin` values. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Teardown bound as a [`Duration`].
    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }

    /// Path of the WebSocket upgrade route.
    pub fn connect_path(&self) -> String {
        format!("{}/connect", self.route_prefix)
    }

    /// Path of the liveness route.
    pub fn ready_path(&self) -> String {
        format!("{}/ready", self.route_prefix)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            route_prefix: "/api".into(),
            max_message_size: 1024 * 1024, // 1 MB
            teardown_timeout_ms: 5_000,
            close_notice: "closing connection".into(),
            allowed_origins: Vec::new(),
        }
    }
}
