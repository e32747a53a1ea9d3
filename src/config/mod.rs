//! Configuration module for tabmerge.
//!
//! Handles tree limits, fetch timeouts, and logging settings.

mod settings;

pub use settings::{
    expand_env_vars, parse_duration, FetchSettings, LoggingSettings, MergeSettings,
    SettingsError, TreeSettings, CONFIG_ENV_VAR,
};
