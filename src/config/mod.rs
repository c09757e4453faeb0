//! Configuration module for odapi.
//!
//! Handles the TOML settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, DatabaseSettings, ExportSettings, LoggingSettings, PoolSettings, Settings,
    SettingsError, CONFIG_ENV, SPREADSHEET_ROW_LIMIT,
};
