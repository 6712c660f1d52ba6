//! Configuration management for tabclip.
//!
//! This module defines the structure of the `tabclip.toml` configuration file
//! and provides functionality to load and parse it. Everything here is wiring
//! for the host collaborators; the copy behavior itself has no knobs.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration structure corresponding to `tabclip.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// DevTools endpoint of the browser to enumerate (e.g. "http://127.0.0.1:9222").
    pub devtools: Option<String>,
    /// Override for the legacy copy command, parsed shell-style.
    pub copy_cmd: Option<String>,
    /// Grace delay before the writer context is torn down (milliseconds).
    pub teardown_delay_ms: Option<u64>,
    /// How long the success indicator stays up (milliseconds).
    pub feedback_delay_ms: Option<u64>,
}

/// Loads and parses the configuration from a file path.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}
