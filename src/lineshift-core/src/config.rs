//! Edit configuration.
//!
//! Loaded from TOML, then overridden from `LINESHIFT_*` environment variables.
//!
//! ```toml
//! save_mode = "auto"
//!
//! [approval]
//! mode = "auto"
//! deny = ["delete"]
//!
//! [logging]
//! level = "debug"
//! json = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::operation::OperationKind;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Environment variable overriding [`EditConfig::save_mode`].
pub const ENV_SAVE_MODE: &str = "LINESHIFT_SAVE_MODE";
/// Environment variable overriding [`ApprovalConfig::mode`].
pub const ENV_APPROVAL: &str = "LINESHIFT_APPROVAL";
/// Environment variable overriding [`LoggingConfig::level`].
pub const ENV_LOG_LEVEL: &str = "LINESHIFT_LOG_LEVEL";

/// When buffers are written back after a successful batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Save every touched buffer after a fully successful batch.
    Auto,
    /// Leave saving to the user.
    #[default]
    Manual,
}

impl std::str::FromStr for SaveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            _ => Err(format!("Unknown save mode: {s}")),
        }
    }
}

/// Approval mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Approve everything not listed in `deny`.
    #[default]
    Auto,
    /// Reject every operation.
    Deny,
}

impl std::str::FromStr for ApprovalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "deny" => Ok(Self::Deny),
            _ => Err(format!("Unknown approval mode: {s}")),
        }
    }
}

/// Rules for the config-driven approval gate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Approval mode.
    pub mode: ApprovalMode,
    /// Operation kinds that are always rejected.
    pub deny: Vec<OperationKind>,
}

/// Logging settings for binaries built on this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON log lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    pub save_mode: SaveMode,
    pub approval: ApprovalConfig,
    pub logging: LoggingConfig,
}

impl EditConfig {
    /// Parse TOML text.
    pub fn parse(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `LINESHIFT_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_SAVE_MODE) {
            self.save_mode = parse_override(ENV_SAVE_MODE, &value)?;
        }

        if let Some(value) = lookup(ENV_APPROVAL) {
            self.approval.mode = parse_override(ENV_APPROVAL, &value)?;
        }

        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = value;
        }

        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}
