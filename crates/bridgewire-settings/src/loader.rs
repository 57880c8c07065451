//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BridgeSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `BRIDGEWIRE_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::BridgeSettings;

/// Resolve the default settings file (`~/.bridgewire/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".bridgewire").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<BridgeSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<BridgeSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the settings file, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<BridgeSettings> {
    let defaults = serde_json::to_value(BridgeSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
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

/// Apply `BRIDGEWIRE_*` environment variables to loaded settings.
pub fn apply_env_overrides(settings: &mut BridgeSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are logged and ignored, keeping the file/default value.
pub fn apply_overrides<F>(settings: &mut BridgeSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Connection ──────────────────────────────────────────────────
    if let Some(v) = env.string("BRIDGEWIRE_URL") {
        settings.connection.url = v;
    }
    if let Some(v) = env.string("BRIDGEWIRE_TOKEN") {
        settings.connection.token = v;
    }
    if let Some(v) = env.u64("BRIDGEWIRE_RECONNECT_DELAY", 1, 3600) {
        settings.connection.reconnect_delay_secs = v;
    }
    if let Some(v) = env.u64("BRIDGEWIRE_CALL_TIMEOUT", 1, 600) {
        settings.connection.call_timeout_secs = v;
    }

    // ── Workers ─────────────────────────────────────────────────────
    if let Some(v) = env.usize("BRIDGEWIRE_RPC_WORKERS", 1, 1024) {
        settings.workers.rpc_workers = v;
    }
    if let Some(v) = env.usize("BRIDGEWIRE_EVENT_WORKERS", 1, 4096) {
        settings.workers.event_workers = v;
    }

    // ── Profile and logging ─────────────────────────────────────────
    if let Some(v) = env.bool("BRIDGEWIRE_DEBUG") {
        settings.profile.debug = v;
    }
    if let Some(v) = env.string("BRIDGEWIRE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
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

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"connection": {"url": "ws://a", "token": "t"}});
        let source = serde_json::json!({"connection": {"url": "ws://b"}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["connection"]["url"], "ws://b");
        assert_eq!(merged["connection"]["token"], "t");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1});
        let source = serde_json::json!({"a": null, "b": 2});
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

    // ── file layer ──────────────────────────────────────────────────

    #[test]
    fn missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, BridgeSettings::default());
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"connection": {"url": "wss://bot.example/ws", "callTimeoutSecs": 9}, "workers": {"rpcWorkers": 4}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.connection.url, "wss://bot.example/ws");
        assert_eq!(settings.connection.call_timeout_secs, 9);
        assert_eq!(settings.connection.reconnect_delay_secs, 5);
        assert_eq!(settings.workers.rpc_workers, 4);
        assert_eq!(settings.workers.event_workers, 64);
    }

    #[test]
    fn invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert_matches!(load_file_layer(&path), Err(SettingsError::Json(_)));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply_valid_values() {
        let mut settings = BridgeSettings::default();
        apply_overrides(
            &mut settings,
            lookup_from(&[
                ("BRIDGEWIRE_URL", "ws://10.0.0.2:9000"),
                ("BRIDGEWIRE_TOKEN", "secret"),
                ("BRIDGEWIRE_RECONNECT_DELAY", "12"),
                ("BRIDGEWIRE_CALL_TIMEOUT", "30"),
                ("BRIDGEWIRE_RPC_WORKERS", "8"),
                ("BRIDGEWIRE_DEBUG", "yes"),
                ("BRIDGEWIRE_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(settings.connection.url, "ws://10.0.0.2:9000");
        assert_eq!(settings.connection.token, "secret");
        assert_eq!(settings.connection.reconnect_delay_secs, 12);
        assert_eq!(settings.connection.call_timeout_secs, 30);
        assert_eq!(settings.workers.rpc_workers, 8);
        assert!(settings.profile.debug);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn overrides_ignore_invalid_values() {
        let mut settings = BridgeSettings::default();
        apply_overrides(
            &mut settings,
            lookup_from(&[
                ("BRIDGEWIRE_URL", ""),
                ("BRIDGEWIRE_RECONNECT_DELAY", "soon"),
                ("BRIDGEWIRE_RPC_WORKERS", "0"),
                ("BRIDGEWIRE_DEBUG", "maybe"),
            ]),
        );
        assert_eq!(settings, BridgeSettings::default());
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "on", "TRUE", "On"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "off", "No"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u64_range("5", 1, 10), Some(5));
        assert_eq!(parse_u64_range("11", 1, 10), None);
        assert_eq!(parse_u64_range("x", 1, 10), None);
        assert_eq!(parse_usize_range("16", 1, 1024), Some(16));
        assert_eq!(parse_usize_range("0", 1, 1024), None);
    }
}
