//! Configuration file management.
//!
//! ```toml
//! [api]
//! url = "https://api.data.gov.in/resource/3b01bcb8-0b14-4abf-b6f2-c1bfd384ba69"
//!
//! [storage]
//! mode = "csv"
//! csv_path = "pollution_data.csv"
//! overwrite = true
//! sqlite_path = "pollution_data.db"
//! table = "readings"
//! dedup = "keep-all"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use aqi_core::fetch::DEFAULT_API_URL;
use aqi_store::{DEFAULT_TABLE, DedupPolicy, StoreTarget};

use crate::cli::StorageMode;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream API settings.
    pub api: ApiConfig,
    /// Storage settings.
    pub storage: StorageConfig,
}

/// Upstream API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Resource URL.
    pub url: String,
    /// API key; `--api-key` and `DATA_GOV_API_KEY` take precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            key: None,
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend used when `--mode` is not given.
    pub mode: StorageMode,
    /// Flat-file location.
    pub csv_path: PathBuf,
    /// Rewrite the CSV file with each batch.
    pub overwrite: bool,
    /// Database location.
    pub sqlite_path: PathBuf,
    /// Table inside the database.
    pub table: String,
    /// Duplicate handling on append.
    pub dedup: DedupPolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::Csv,
            csv_path: PathBuf::from("pollution_data.csv"),
            overwrite: true,
            sqlite_path: PathBuf::from("pollution_data.db"),
            table: DEFAULT_TABLE.to_string(),
            dedup: DedupPolicy::KeepAll,
        }
    }
}

impl StorageConfig {
    /// Build the store target for `mode`, with an optional path and table override.
    pub fn target(
        &self,
        mode: StorageMode,
        path: Option<PathBuf>,
        table: Option<String>,
        overwrite: bool,
    ) -> StoreTarget {
        match mode {
            StorageMode::Csv => StoreTarget::Csv {
                path: path.unwrap_or_else(|| self.csv_path.clone()),
                overwrite,
            },
            StorageMode::Sqlite => StoreTarget::Sqlite {
                path: path.unwrap_or_else(|| self.sqlite_path.clone()),
                table: table.unwrap_or_else(|| self.table.clone()),
            },
        }
    }

    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.csv_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.csv_path".to_string(),
                message: "CSV path cannot be empty".to_string(),
            });
        }

        if self.sqlite_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.sqlite_path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        if aqi_store::schema::validate_table_name(&self.table).is_err() {
            errors.push(ValidationError {
                field: "storage.table".to_string(),
                message: format!(
                    "invalid table name '{}': use letters, digits and underscores",
                    self.table
                ),
            });
        }

        errors
    }
}

impl ApiConfig {
    /// Validate API configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.url.trim().is_empty() {
            errors.push(ValidationError {
                field: "api.url".to_string(),
                message: "URL cannot be empty".to_string(),
            });
        } else if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            errors.push(ValidationError {
                field: "api.url".to_string(),
                message: format!("URL must start with http:// or https://, got: {}", self.url),
            });
        }

        if let Some(key) = &self.key
            && key.trim().is_empty()
        {
            errors.push(ValidationError {
                field: "api.key".to_string(),
                message: "key cannot be empty string (omit it instead)".to_string(),
            });
        }

        errors
    }
}

impl Config {
    /// Load from `path` if given, else from the default path.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load_default(),
        }
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - The API URL is HTTP(S)
    /// - Storage paths are not empty
    /// - The table name is a plain SQL identifier
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = self.api.validate();
        errors.extend(self.storage.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Replace the API URL when one was given on the command line.
    pub fn with_api_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.api.url = url;
        }
        self
    }

    /// Copy suitable for display, with the API key masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.api.key.is_some() {
            copy.api.key = Some("********".to_string());
        }
        copy
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `storage.table`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aqi")
        .join("config.toml")
}
