//! Tracing subscriber setup

use anyhow::Context;
use paperchat_common::Config;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// Returns false when a subscriber was already installed.
pub fn init(config: &Config) -> anyhow::Result<bool> {
    let filter = EnvFilter::try_new(&config.rust_log)
        .with_context(|| format!("Invalid log filter: {}", config.rust_log))?;

    let installed = if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::debug!(filter = %config.rust_log, json = config.log_json, "Tracing initialized");
    }
    Ok(installed)
}
