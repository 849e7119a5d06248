//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`LifelineSettings::default()`]
//! 2. If `~/.lifeline/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `LIFELINE_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{LifelineSettings, LogLevel};

/// Resolve the path to the settings file (`~/.lifeline/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".lifeline").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<LifelineSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<LifelineSettings> {
    let defaults = serde_json::to_value(LifelineSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: LifelineSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply `LIFELINE_*` environment variable overrides to loaded settings.
///
/// Strict parsing: integers must be valid and within range; invalid values
/// are silently ignored (falling back to file/default).
pub fn apply_env_overrides(settings: &mut LifelineSettings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Override application against an arbitrary variable source (testable).
pub fn apply_overrides_from<F>(settings: &mut LifelineSettings, get: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = read_string(&get, "LIFELINE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_u64(&get, "LIFELINE_PORT", 0, 65_535) {
        #[allow(clippy::cast_possible_truncation)]
        {
            settings.server.port = v as u16;
        }
    }
    if let Some(v) = read_u64(&get, "LIFELINE_MAX_CONNECTIONS", 1, 1_000_000) {
        #[allow(clippy::cast_possible_truncation)]
        {
            settings.server.max_connections = v as usize;
        }
    }
    if let Some(v) = read_u64(&get, "LIFELINE_HEARTBEAT_INTERVAL_SECS", 1, 3_600) {
        settings.server.heartbeat_interval_secs = v;
    }
    if let Some(v) = read_u64(&get, "LIFELINE_HEARTBEAT_TIMEOUT_SECS", 1, 86_400) {
        settings.server.heartbeat_timeout_secs = v;
    }
    if let Some(v) = read_u64(&get, "LIFELINE_SEND_QUEUE_CAPACITY", 1, 1_000_000) {
        #[allow(clippy::cast_possible_truncation)]
        {
            settings.server.send_queue_capacity = v as usize;
        }
    }
    if let Some(v) = read_string(&get, "LIFELINE_DB_PATH") {
        settings.store.db_path = Some(v);
    }
    if let Some(v) = read_u64(&get, "LIFELINE_POOL_SIZE", 1, 1_024) {
        #[allow(clippy::cast_possible_truncation)]
        {
            settings.store.pool_size = v as u32;
        }
    }
    if let Some(v) = get("LIFELINE_LOG_LEVEL").and_then(|s| LogLevel::parse(&s)) {
        settings.logging.level = v;
    }
}

fn read_string<F>(get: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    get(key).filter(|v| !v.trim().is_empty())
}

fn read_u64<F>(get: &F, key: &str, min: u64, max: u64) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| (min..=max).contains(v))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
