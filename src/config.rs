//! TOML configuration for the `cashbook` binary.
//!
//! Every section and key is optional; an empty file yields the defaults.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//!
//! [storage]
//! backend = "google_sheets"   # "memory", "file" or "google_sheets"
//! data_dir = "data"
//!
//! [google_sheets]
//! credentials_path = "credentials.json"
//! spreadsheet_id = "1AbC..."
//! token_cache = "tokens.json"
//!
//! [retry]
//! max_retries = 3
//! base_delay_ms = 200
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Missing(PathBuf),
    /// The config file was read but is not usable.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(path) => write!(f, "config file {} not found", path.display()),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Process-local tables, lost on exit.
    Memory,
    /// One CSV file per table under `data_dir`.
    #[default]
    File,
    /// A Google Sheets spreadsheet.
    GoogleSheets,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: Backend,
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GoogleSheetsConfig {
    pub credentials_path: PathBuf,
    pub spreadsheet_id: Option<String>,
    pub token_cache: PathBuf,
}

impl Default for GoogleSheetsConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            spreadsheet_id: None,
            token_cache: PathBuf::from("tokens.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub google_sheets: GoogleSheetsConfig,
    pub retry: RetryConfig,
}

impl Config {
    /// Reads and validates the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data =
            fs::read_to_string(path).map_err(|_| ConfigError::Missing(path.to_path_buf()))?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(data: &str) -> Result<Self, ConfigError> {
        let cfg: Config =
            toml::from_str(data).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == Backend::GoogleSheets {
            if self.google_sheets.credentials_path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "google_sheets.credentials_path is missing".into(),
                ));
            }
            if self
                .google_sheets
                .spreadsheet_id
                .as_deref()
                .is_none_or(|id| id.trim().is_empty())
            {
                return Err(ConfigError::Invalid(
                    "google_sheets.spreadsheet_id is missing".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Extracts the spreadsheet id from a full sheet URL, or returns the input
/// unchanged when it is already a bare id.
pub fn parse_sheet_id(input: &str) -> String {
    match input.find("/d/") {
        Some(start) => {
            let rest = &input[start + 3..];
            let end = rest.find('/').unwrap_or(rest.len());
            rest[..end].to_string()
        }
        None => input.trim().to_string(),
    }
}
