//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a user
//! file only needs the fields it overrides.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the gateway.
///
/// ```json
/// {
///   "server": { "port": 9000, "allowedOrigins": ["https://play.example"] },
///   "upstream": { "host": "mud.example", "port": 4000 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// HTTP / WebSocket server settings.
    pub server: ServerSettings,
    /// Output grammar tokens shared with the engine and clients.
    pub protocol: ProtocolSettings,
    /// Upstream the shipped TCP engine connects to.
    pub upstream: UpstreamSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl GatewaySettings {
    /// Reject combinations the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.server.route_prefix.is_empty() && !self.server.route_prefix.starts_with('/') {
            return Err(SettingsError::InvalidValue(format!(
                "server.routePrefix must start with '/': {:?}",
                self.server.route_prefix
            )));
        }
        if self.server.max_message_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxMessageSize must be greater than zero".into(),
            ));
        }
        if self.server.teardown_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.teardownTimeoutMs must be greater than zero".into(),
            ));
        }
        if self.protocol.marker.contains('\x1b') || self.protocol.separator.contains('\x1b') {
            return Err(SettingsError::InvalidValue(
                "protocol tokens must not contain escape characters".into(),
            ));
        }
        if !self.protocol.marker.is_empty() && self.protocol.marker == self.protocol.separator {
            return Err(SettingsError::InvalidValue(
                "protocol.marker and protocol.separator must differ".into(),
            ));
        }
        if self.upstream.host.is_empty() {
            return Err(SettingsError::InvalidValue("upstream.host is required".into()));
        }
        if self.upstream.port == 0 {
            return Err(SettingsError::InvalidValue(
                "upstream.port must be non-zero".into(),
            ));
        }
        if self.upstream.max_line_length == 0 {
            return Err(SettingsError::InvalidValue(
                "upstream.maxLineLength must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Server network and session settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Prefix for the connect and ready routes.
    pub route_prefix: String,
    /// Maximum inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// How long session teardown may wait for tasks before aborting them.
    pub teardown_timeout_ms: u64,
    /// Text frame sent to the client when a session closes.
    pub close_notice: String,
    /// Allowed `Origin` header values. Empty allows any origin.
    pub allowed_origins: Vec<String>,
    /// How long server shutdown waits for sessions to drain.
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            route_prefix: "/api".to_string(),
            max_message_size: 1024 * 1024,
            teardown_timeout_ms: 5_000,
            close_notice: "closing connection".to_string(),
            allowed_origins: Vec::new(),
            shutdown_timeout_ms: 30_000,
        }
    }
}

/// Reserved tokens of the instruction grammar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolSettings {
    /// Token prefixing instruction-bearing output.
    pub marker: String,
    /// Token delimiting buffered segments.
    pub separator: String,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            marker: "@@instruction@@".to_string(),
            separator: "@@buffer@@".to_string(),
        }
    }
}

/// Line-oriented TCP upstream used by the shipped engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpstreamSettings {
    /// Upstream host.
    pub host: String,
    /// Upstream port.
    pub port: u16,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Longest accepted upstream line in bytes.
    pub max_line_length: usize,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            connect_timeout_ms: 10_000,
            max_line_length: 64 * 1024,
        }
    }
}

impl UpstreamSettings {
    /// `host:port` form for connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level (most verbose).
    Trace,
    /// Debug-level.
    Debug,
    /// Info-level (default).
    #[default]
    Info,
    /// Warning-level.
    Warn,
    /// Error-level.
    Error,
}

impl LogLevel {
    /// Convert to a tracing filter string.
    pub fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level; `RUST_LOG` takes precedence.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
}
