//! TOML-based configuration for odapi.
//!
//! Supports a config file (`odapi.toml`) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [database]
//! path = "${ODAPI_DATA}/odapi.db"
//! dialect = "sqlite"
//!
//! [pool]
//! max_connections = 8
//! acquire_timeout_ms = 5000
//!
//! [export]
//! spreadsheet_max_rows = 1048575
//! columnar_batch_size = 8192
//! chunk_size = 65536
//! channel_capacity = 16
//!
//! [logging]
//! filter = "odapi=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::schema::SchemaNames;
use crate::sql::Dialect;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "ODAPI_CONFIG";

/// Largest data row count a worksheet can hold below its header row.
pub const SPREADSHEET_ROW_LIMIT: u64 = 1_048_575;

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

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub pool: PoolSettings,
    pub export: ExportSettings,
    pub logging: LoggingSettings,
}

/// Database location and SQL flavour.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite database file (supports `${ENV_VAR}` expansion).
    pub path: String,

    /// Dialect for compile-only output.
    pub dialect: Dialect,

    /// Qualifier of the mart tables.
    pub marts_schema: Option<String>,

    /// Qualifier of the seed tables.
    pub seeds_schema: Option<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "odapi.db".to_string(),
            dialect: Dialect::Sqlite,
            marts_schema: None,
            seeds_schema: None,
        }
    }
}

impl DatabaseSettings {
    /// Database path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<PathBuf, SettingsError> {
        expand_env_vars(&self.path).map(PathBuf::from)
    }

    /// Schema qualifiers with environment variables expanded.
    pub fn schema_names(&self) -> Result<SchemaNames, SettingsError> {
        let expand = |s: &Option<String>| s.as_deref().map(expand_env_vars).transpose();
        Ok(SchemaNames {
            marts: expand(&self.marts_schema)?,
            seeds: expand(&self.seeds_schema)?,
        })
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of connections in use at once.
    pub max_connections: usize,

    /// How long a request waits for a free connection.
    pub acquire_timeout_ms: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 8,
            acquire_timeout_ms: 5000,
        }
    }
}

/// Export limits and streaming sizes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Hard cap on spreadsheet data rows.
    pub spreadsheet_max_rows: u64,

    /// Rows per Parquet record batch; each batch is written as one row group.
    pub columnar_batch_size: usize,

    /// Bytes per streamed body chunk.
    pub chunk_size: usize,

    /// Chunks buffered between the encoder and the transport.
    pub channel_capacity: usize,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            spreadsheet_max_rows: SPREADSHEET_ROW_LIMIT,
            columnar_batch_size: 8192,
            chunk_size: 64 * 1024,
            channel_capacity: 16,
        }
    }
}

/// Log filter used when `RUST_LOG` is unset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Settings {
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
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `ODAPI_CONFIG`
    /// 2. `./odapi.toml`
    /// 3. `<config_dir>/odapi/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        match Self::locate() {
            Some(path) => Self::from_file(path),
            None => Ok(Settings::default()),
        }
    }

    /// The config file `load` would read, if any.
    pub fn locate() -> Option<PathBuf> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        let local_config = PathBuf::from("odapi.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir()
            .map(|dir| dir.join("odapi").join("config.toml"))
            .filter(|path| path.exists())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.pool.max_connections == 0 {
            return Err(SettingsError::Invalid(
                "pool.max_connections must be greater than 0".into(),
            ));
        }
        if !(1..=SPREADSHEET_ROW_LIMIT).contains(&self.export.spreadsheet_max_rows) {
            return Err(SettingsError::Invalid(format!(
                "export.spreadsheet_max_rows must be between 1 and {SPREADSHEET_ROW_LIMIT}"
            )));
        }
        if self.export.columnar_batch_size == 0 {
            return Err(SettingsError::Invalid(
                "export.columnar_batch_size must be greater than 0".into(),
            ));
        }
        if self.export.chunk_size == 0 || self.export.channel_capacity == 0 {
            return Err(SettingsError::Invalid(
                "export.chunk_size and export.channel_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            chars.by_ref().take_while(|&ch| ch != '}').collect()
        } else {
            // $VAR ends at the first non-alphanumeric, non-underscore char.
            std::iter::from_fn(|| chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_')).collect()
        };

        if var_name.is_empty() {
            // Just a lone $, keep it
            result.push('$');
            continue;
        }
        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
