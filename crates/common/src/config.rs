//! Configuration management following 12-factor app principles
//!
//! Application-level settings are loaded from environment variables.
//! Backend-specific settings live next to their crates
//! (`StorageConfig`, `LlmConfig`).

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

const DEFAULT_METADATA_MAX_AGE_HOURS: u64 = 24;
const DEFAULT_RECENT_PAPERS_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Tracing filter directive
    pub rust_log: String,

    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,

    /// How long cached paper metadata stays valid
    pub metadata_max_age_hours: u64,

    /// How many papers the recent list shows
    pub recent_papers_limit: usize,

    /// Refuse to delete a paper's only thread
    pub protect_last_thread: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rust_log: "paperchat=debug".to_string(),
            log_json: false,
            metadata_max_age_hours: DEFAULT_METADATA_MAX_AGE_HOURS,
            recent_papers_limit: DEFAULT_RECENT_PAPERS_LIMIT,
            protect_last_thread: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let defaults = Self::default();

        let metadata_max_age_hours: u64 = parse_var(
            "METADATA_MAX_AGE_HOURS",
            "a whole number",
            defaults.metadata_max_age_hours,
        )?;
        if max_age_duration(metadata_max_age_hours).is_none() {
            anyhow::bail!("METADATA_MAX_AGE_HOURS is too large, got {metadata_max_age_hours}");
        }

        let config = Self {
            rust_log: env::var("RUST_LOG").unwrap_or(defaults.rust_log),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(defaults.log_json),
            metadata_max_age_hours,
            recent_papers_limit: parse_var(
                "RECENT_PAPERS_LIMIT",
                "a whole number",
                defaults.recent_papers_limit,
            )?,
            protect_last_thread: parse_var(
                "PROTECT_LAST_THREAD",
                "true or false",
                defaults.protect_last_thread,
            )?,
        };

        Ok(config)
    }

    /// Metadata max age as a chrono duration
    ///
    /// Ages beyond what chrono can represent saturate to the largest duration.
    pub fn metadata_max_age(&self) -> chrono::Duration {
        max_age_duration(self.metadata_max_age_hours).unwrap_or(chrono::Duration::MAX)
    }
}

fn max_age_duration(hours: u64) -> Option<chrono::Duration> {
    i64::try_from(hours).ok().and_then(chrono::Duration::try_hours)
}

/// Parse an optional variable, falling back to `default` only when it is unset
fn parse_var<T: FromStr>(name: &str, expected: &str, default: T) -> anyhow::Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} must be {expected}, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
