//! TOML-based configuration for the merge engine.
//!
//! Example configuration:
//! ```toml
//! [tree]
//! max_dependency_depth = 15
//! strict_grouping = true
//!
//! [fetch]
//! timeout = "5m"
//! data_dir = "${STUDY_DATA_DIR}/tabular"
//!
//! [logging]
//! level = "debug"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "TABMERGE_CONFIG";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid duration format: {0}")]
    InvalidDuration(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MergeSettings {
    /// Entity tree construction and iteration.
    pub tree: TreeSettings,

    /// Stream acquisition.
    pub fetch: FetchSettings,

    /// Log output (CLI only; the library never installs a logger).
    pub logging: LoggingSettings,
}

/// Entity tree settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TreeSettings {
    /// Deepest allowed chain of ancestor/reduction nodes.
    pub max_dependency_depth: usize,

    /// Track retired parent ids and fail when rows for one parent are not contiguous.
    ///
    /// Costs memory proportional to the number of distinct parent ids.
    pub strict_grouping: bool,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            max_dependency_depth: 15,
            strict_grouping: false,
        }
    }
}

/// Stream acquisition settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Wall-clock limit for opening all required streams (e.g., "90s", "5m").
    pub timeout: String,

    /// Directory of per-entity TSV files (supports ${ENV_VAR} expansion).
    pub data_dir: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: "5m".to_string(),
            data_dir: None,
        }
    }
}

impl FetchSettings {
    /// Parsed fetch timeout.
    pub fn timeout_duration(&self) -> Result<Duration, SettingsError> {
        parse_duration(&self.timeout)
    }

    /// Data directory with environment variables expanded.
    pub fn resolved_data_dir(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.data_dir
            .as_deref()
            .map(|dir| expand_env_vars(dir).map(PathBuf::from))
            .transpose()
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter passed to the logger when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl MergeSettings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: MergeSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `TABMERGE_CONFIG`
    /// 2. `./tabmerge.toml`
    /// 3. `~/.config/tabmerge/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("tabmerge.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tabmerge").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(MergeSettings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.tree.max_dependency_depth == 0 {
            return Err(SettingsError::InvalidConfig(
                "tree.max_dependency_depth must be at least 1".to_string(),
            ));
        }
        self.fetch.timeout_duration()?;
        Ok(())
    }
}

/// Parse a duration such as `"30s"`, `"5m"` or `"2h"`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, SettingsError> {
    let trimmed = s.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| SettingsError::InvalidDuration(s.to_string()))?;
    let seconds = match unit {
        "" | "s" => amount,
        "m" => amount * 60,
        "h" => amount * 3600,
        _ => return Err(SettingsError::InvalidDuration(s.to_string())),
    };
    Ok(Duration::from_secs(seconds))
}

/// Expand `${VAR}` references in a string.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| SettingsError::InvalidConfig(format!("unterminated variable in '{}'", s)))?;
        let name = &after[..end];
        let value = env::var(name).map_err(|_| SettingsError::MissingEnvVar(name.to_string()))?;
        result.push_str(&value);
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    Ok(result)
}
