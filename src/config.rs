//! Configuration file parser for `feedscout.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::feed::{default_probe_suffixes, USER_AGENT};
use crate::util::DEFAULT_SUMMARY_LIMIT;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_PATH: &str = "feedscout.toml";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// YAML feed list read by every command.
    pub feeds_path: String,

    /// SQLite article store used by `ingest`.
    pub database_path: String,

    /// Client identity sent with every request.
    pub user_agent: String,

    pub request_timeout_secs: u64,

    /// Largest response body accepted, in bytes.
    pub max_body_bytes: usize,

    /// Retries after a 429 or 5xx response. 0 = fail immediately.
    pub max_retries: u32,

    /// Feeds ingested at once.
    pub ingest_concurrency: usize,

    /// Feeds validated at once by `check` and `fix`.
    pub check_concurrency: usize,

    pub summary_char_limit: usize,

    pub max_items_per_feed: usize,

    /// Path suffixes probed by discovery, in order.
    pub probe_suffixes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds_path: "feeds.yaml".to_string(),
            database_path: "news.db".to_string(),
            user_agent: USER_AGENT.to_string(),
            request_timeout_secs: 15,
            max_body_bytes: 10 * 1024 * 1024,
            max_retries: 0,
            ingest_concurrency: 10,
            check_concurrency: 12,
            summary_char_limit: DEFAULT_SUMMARY_LIMIT,
            max_items_per_feed: 50,
            probe_suffixes: default_probe_suffixes(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 11] = [
        "feeds_path",
        "database_path",
        "user_agent",
        "request_timeout_secs",
        "max_body_bytes",
        "max_retries",
        "ingest_concurrency",
        "check_concurrency",
        "summary_char_limit",
        "max_items_per_feed",
        "probe_suffixes",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check the size before reading a corrupted or huge file into memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            feeds = %config.feeds_path,
            database = %config.database_path,
            "Loaded configuration"
        );
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================
