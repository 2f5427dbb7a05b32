//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ClawboardSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::ClawboardSettings;

/// Resolve the path to the settings file (`~/.clawboard/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".clawboard").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ClawboardSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults (plus env overrides). If the
/// file contains invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<ClawboardSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<ClawboardSettings> {
    let defaults = serde_json::to_value(ClawboardSettings::default())?;

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

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut ClawboardSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning so a typo in the environment
/// never prevents startup.
pub fn apply_overrides_from<F>(settings: &mut ClawboardSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = string("HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_parsed(&lookup, "PORT", |v| parse_u16_range(v, 1, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = read_parsed(&lookup, "CLAWBOARD_NOTIFY_BOT_MISSING", parse_bool) {
        settings.server.notify_bot_missing = v;
    }

    // ── Bot ─────────────────────────────────────────────────────────
    if let Some(v) = string("WS_URL") {
        settings.bot.ws_url = v;
    }
    if let Some(v) = string("API_URL") {
        settings.bot.api_url = v;
    }
    if let Some(v) = string("CLAWBOARD_BOT_NAME") {
        settings.bot.name = v;
    }
    if let Some(v) = read_parsed(&lookup, "CLAWBOARD_MAX_RECONNECT_ATTEMPTS", |v| {
        parse_u64_range(v, 0, 1000).and_then(|n| u32::try_from(n).ok())
    }) {
        settings.bot.max_reconnect_attempts = v;
    }
    if let Some(v) = read_parsed(&lookup, "CLAWBOARD_RECONNECT_INTERVAL_MS", |v| {
        parse_u64_range(v, 10, 3_600_000)
    }) {
        settings.bot.reconnect_interval_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("CLAWBOARD_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

fn read_parsed<F, T>(lookup: &F, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
{
    let val = lookup(name)?;
    let result = parse(&val);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    result
}

/// Reject settings that cannot work at runtime.
pub fn validate(settings: &ClawboardSettings) -> Result<()> {
    if settings.server.max_connections == 0 {
        return Err(SettingsError::InvalidValue(
            "server.maxConnections must be at least 1".into(),
        ));
    }
    if settings.server.send_queue_size == 0 {
        return Err(SettingsError::InvalidValue(
            "server.sendQueueSize must be at least 1".into(),
        ));
    }
    let ws_url = settings.bot.ws_url.as_str();
    if !(ws_url.starts_with("ws://") || ws_url.starts_with("wss://")) {
        return Err(SettingsError::InvalidValue(format!(
            "bot.wsUrl must be a ws:// or wss:// URL, got {ws_url}"
        )));
    }
    if settings.bot.heartbeat_interval_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "bot.heartbeatIntervalMs must be non-zero".into(),
        ));
    }
    Ok(())
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

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
