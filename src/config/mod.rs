// src/config/mod.rs
// Picker configuration loaded from .env and the environment

use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::picker::DEFAULT_SAMPLE_RATE;

#[derive(Debug, Clone, Deserialize)]
pub struct PickerConfig {
    // ── Sampler
    pub sampler_binary: Option<PathBuf>,
    pub sample_rate: u32,
    pub startup_timeout_ms: u64,

    // ── Magnifier geometry
    pub diameter: f64,
    pub cell_size: f64,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            sampler_binary: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            startup_timeout_ms: 30_000,
            diameter: 180.0,
            cell_size: 20.0,
        }
    }
}

/// Parse `key` from `lookup`, ignoring trailing `#` comments and whitespace.
/// Missing or unparsable values fall back to `default`.
fn env_var_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(val) = lookup(key) else {
        return default;
    };

    let clean_val = val.split('#').next().unwrap_or("").trim();
    match clean_val.parse::<T>() {
        Ok(parsed) => {
            debug!(key, value = clean_val, "Config value from environment");
            parsed
        }
        Err(_) => {
            warn!(key, value = %val, "Config value failed to parse, using default");
            default
        }
    }
}

impl PickerConfig {
    /// Load from `.env` (if present) and the process environment
    pub fn from_env() -> Self {
        if dotenvy::dotenv().is_err() {
            debug!(".env file not found, using environment variables and defaults");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let sampler_binary = lookup("HUE_HUNTER_SAMPLER_BIN")
            .map(|val| val.trim().to_string())
            .filter(|val| !val.is_empty())
            .map(PathBuf::from);

        Self {
            sampler_binary,
            sample_rate: env_var_or(&lookup, "HUE_HUNTER_SAMPLE_RATE", defaults.sample_rate),
            startup_timeout_ms: env_var_or(
                &lookup,
                "HUE_HUNTER_STARTUP_TIMEOUT_MS",
                defaults.startup_timeout_ms,
            ),
            diameter: env_var_or(&lookup, "HUE_HUNTER_DIAMETER", defaults.diameter),
            cell_size: env_var_or(&lookup, "HUE_HUNTER_CELL_SIZE", defaults.cell_size),
        }
    }
}
