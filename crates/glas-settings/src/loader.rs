//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`GatewaySettings::default()`]
//! 2. If `~/.glas/gateway.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::GatewaySettings;

/// Resolve the path to the settings file (`~/.glas/gateway.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".glas").join("gateway.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<GatewaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<GatewaySettings> {
    let defaults = serde_json::to_value(GatewaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: GatewaySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `GLAS_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut GatewaySettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// - Integers must be valid and within the specified range
/// - Invalid values are ignored with a warning (fall back to file/default)
/// - `GLAS_ALLOWED_ORIGINS` is comma-separated; `*` allows any origin
pub fn apply_overrides(settings: &mut GatewaySettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("GLAS_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("GLAS_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("GLAS_ROUTE_PREFIX") {
        settings.server.route_prefix = v;
    }
    if let Some(v) = env.usize("GLAS_MAX_MESSAGE_SIZE", 1024, 64 * 1024 * 1024) {
        settings.server.max_message_size = v;
    }
    if let Some(v) = env.u64("GLAS_TEARDOWN_TIMEOUT_MS", 100, 600_000) {
        settings.server.teardown_timeout_ms = v;
    }
    if let Some(v) = env.string("GLAS_CLOSE_NOTICE") {
        settings.server.close_notice = v;
    }
    if let Some(v) = env.string("GLAS_ALLOWED_ORIGINS") {
        settings.server.allowed_origins = parse_origin_list(&v);
    }

    // ── Protocol ────────────────────────────────────────────────────
    if let Some(v) = env.string("GLAS_MARKER") {
        settings.protocol.marker = v;
    }
    if let Some(v) = env.string("GLAS_SEPARATOR") {
        settings.protocol.separator = v;
    }

    // ── Upstream ────────────────────────────────────────────────────
    if let Some(v) = env.string("GLAS_UPSTREAM_HOST") {
        settings.upstream.host = v;
    }
    if let Some(v) = env.u16("GLAS_UPSTREAM_PORT", 1, 65535) {
        settings.upstream.port = v;
    }
    if let Some(v) = env.u64("GLAS_UPSTREAM_CONNECT_TIMEOUT_MS", 100, 600_000) {
        settings.upstream.connect_timeout_ms = v;
    }
    if let Some(v) = env.usize("GLAS_UPSTREAM_MAX_LINE_LENGTH", 256, 16 * 1024 * 1024) {
        settings.upstream.max_line_length = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.enum_value("GLAS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.enum_value("GLAS_LOG_FORMAT") {
        settings.logging.format = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a comma-separated origin list. `*` means "any" (empty list).
pub fn parse_origin_list(val: &str) -> Vec<String> {
    let origins: Vec<String> = val
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(ToString::to_string)
        .collect();
    if origins.iter().any(|o| o == "*") {
        Vec::new()
    } else {
        origins
    }
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.lookup)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }

    fn enum_value<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        let val = self.string(name)?;
        let result = serde_json::from_value(Value::String(val.to_lowercase())).ok();
        if result.is_none() {
            warn!(key = name, value = %val, "invalid env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;
    use crate::types::{LogFormat, LogLevel};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"origins": ["a", "b"]});
        let source = serde_json::json!({"origins": ["c"]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["origins"], serde_json::json!(["c"]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_settings_from_path(Path::new("/nonexistent/gateway.json")).unwrap();
        assert_eq!(settings.server.port, GatewaySettings::default().server.port);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");
        std::fs::write(
            &path,
            r#"{"server": {"teardownTimeoutMs": 250}, "upstream": {"host": "mud.example"}}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.server.teardown_timeout_ms, 250);
        assert_eq!(settings.upstream.host, "mud.example");
        assert_eq!(settings.upstream.port, 4000);
        assert_eq!(settings.server.close_notice, "closing connection");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result, Err(SettingsError::Json(_))));
    }

    #[test]
    fn load_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.json");
        std::fs::write(&path, r#"{"server": {"port": "eighty"}}"#).unwrap();

        assert!(load_settings_from_path(&path).is_err());
    }

    // ── apply_overrides ─────────────────────────────────────────────

    #[test]
    fn overrides_server_values() {
        let mut settings = GatewaySettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[
                ("GLAS_HOST", "127.0.0.1"),
                ("GLAS_PORT", "9001"),
                ("GLAS_TEARDOWN_TIMEOUT_MS", "1500"),
                ("GLAS_CLOSE_NOTICE", "bye"),
            ]),
        );
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.server.teardown_timeout_ms, 1500);
        assert_eq!(settings.server.close_notice, "bye");
    }

    #[test]
    fn overrides_ignore_invalid_values() {
        let mut settings = GatewaySettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[
                ("GLAS_PORT", "0"),
                ("GLAS_TEARDOWN_TIMEOUT_MS", "soon"),
                ("GLAS_LOG_LEVEL", "loud"),
                ("GLAS_HOST", ""),
            ]),
        );
        assert_eq!(settings, GatewaySettings::default());
    }

    #[test]
    fn overrides_protocol_and_upstream() {
        let mut settings = GatewaySettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[
                ("GLAS_MARKER", "!!"),
                ("GLAS_SEPARATOR", "::"),
                ("GLAS_UPSTREAM_HOST", "mud.example"),
                ("GLAS_UPSTREAM_PORT", "23"),
                ("GLAS_UPSTREAM_MAX_LINE_LENGTH", "4096"),
            ]),
        );
        assert_eq!(settings.protocol.marker, "!!");
        assert_eq!(settings.protocol.separator, "::");
        assert_eq!(settings.upstream.address(), "mud.example:23");
        assert_eq!(settings.upstream.max_line_length, 4096);
    }

    #[test]
    fn max_line_length_override_is_range_checked() {
        let mut settings = GatewaySettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[("GLAS_UPSTREAM_MAX_LINE_LENGTH", "0")]),
        );
        assert_eq!(
            settings.upstream.max_line_length,
            GatewaySettings::default().upstream.max_line_length
        );
    }

    #[test]
    fn overrides_logging_case_insensitive() {
        let mut settings = GatewaySettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[("GLAS_LOG_LEVEL", "DEBUG"), ("GLAS_LOG_FORMAT", "Json")]),
        );
        assert_eq!(settings.logging.level, LogLevel::Debug);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn overrides_allowed_origins() {
        let mut settings = GatewaySettings::default();
        apply_overrides(
            &mut settings,
            lookup(&[("GLAS_ALLOWED_ORIGINS", "https://a.example, https://b.example,")]),
        );
        assert_eq!(
            settings.server.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_origin_list_wildcard_allows_any() {
        assert!(parse_origin_list("*").is_empty());
        assert!(parse_origin_list("https://a.example,*").is_empty());
        assert!(parse_origin_list(" , ").is_empty());
    }

    #[test]
    fn parse_u16_bounds() {
        assert_eq!(parse_u16_range("9090", 1, 65535), Some(9090));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("99999", 1, 65535), None);
        assert_eq!(parse_u16_range("port", 1, 65535), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("1000", 100, 600_000), Some(1000));
        assert_eq!(parse_u64_range("50", 100, 600_000), None);
        assert_eq!(parse_u64_range("700000", 100, 600_000), None);
    }

    #[test]
    fn parse_usize_bounds() {
        assert_eq!(parse_usize_range("4096", 1024, 8192), Some(4096));
        assert_eq!(parse_usize_range("10", 1024, 8192), None);
    }
}
