//! Editor configuration

use crate::error::ConfigError;
use podscript_status::StatusPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable compact lines
    #[default]
    Pretty,
    /// JSON lines
    Json,
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Editor session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum cached podcast snapshots
    pub snapshot_capacity: u64,
    /// Maximum cached listings
    pub list_capacity: u64,
    /// Treat `drafting` as a generating status
    pub drafting_is_generating: bool,
    /// Logging
    pub log: LogConfig,
}

impl EditorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With snapshot cache capacity
    #[inline]
    #[must_use]
    pub fn with_snapshot_capacity(mut self, capacity: u64) -> Self {
        self.snapshot_capacity = capacity;
        self
    }

    /// With listing cache capacity
    #[inline]
    #[must_use]
    pub fn with_list_capacity(mut self, capacity: u64) -> Self {
        self.list_capacity = capacity;
        self
    }

    /// With the `drafting` policy switch
    #[inline]
    #[must_use]
    pub fn with_drafting_is_generating(mut self, enabled: bool) -> Self {
        self.drafting_is_generating = enabled;
        self
    }

    /// With log filter directive
    #[inline]
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log.filter = filter.into();
        self
    }

    /// With log format
    #[inline]
    #[must_use]
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log.format = format;
        self
    }

    /// Status policy derived from this config
    #[inline]
    #[must_use]
    pub fn status_policy(&self) -> StatusPolicy {
        StatusPolicy {
            drafting_is_generating: self.drafting_is_generating,
        }
    }

    /// Parse TOML; missing keys take their defaults
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on invalid TOML or field types
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            snapshot_capacity: 256,
            list_capacity: 16,
            drafting_is_generating: false,
            log: LogConfig::default(),
        }
    }
}
