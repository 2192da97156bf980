//! Configuration loading and root folder resolution
//!
//! Sources, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file (`objrel.toml` in the root folder)
//! 4. OS-dependent compiled default
//!
//! A missing TOML file is never fatal: defaults are used and a warning logged.

use crate::entity_types::EntityTypeDescriptor;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "OBJREL_ROOT_FOLDER";

/// Config file name looked up inside the root folder
pub const CONFIG_FILE_NAME: &str = "objrel.toml";

/// Database file name used when the config does not name one
pub const DEFAULT_DATABASE_FILE: &str = "objrel.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// SQLite database path; relative paths resolve against the root folder
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound for a single scan or remediation call
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Entity type registry descriptors; empty means "use built-in defaults"
    #[serde(default)]
    pub entity_types: Vec<EntityTypeDescriptor>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            port: default_port(),
            operation_timeout_ms: default_operation_timeout_ms(),
            logging: LoggingConfig::default(),
            entity_types: Vec::new(),
        }
    }
}

fn default_port() -> u16 {
    5790
}

fn default_operation_timeout_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))
    }

    /// Read configuration from a file without logging
    ///
    /// Returns `None` when the file does not exist. A file that exists but
    /// cannot be parsed is an error: silently ignoring a broken registry
    /// definition would change query results. Usable before tracing is set up.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map(Some)
    }

    /// Load configuration from a file, falling back to defaults when it is missing
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path)? {
            Some(config) => {
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => {
                warn!(
                    "Config file not found at {}, using compiled defaults",
                    path.display()
                );
                Ok(Self::default())
            }
        }
    }

    /// Resolve the database file location against the root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root_folder.join(path),
            None => root_folder.join(DEFAULT_DATABASE_FILE),
        }
    }
}

/// Resolve the root folder (CLI > environment > compiled default)
pub fn resolve_root_folder(cli_arg: Option<&Path>, env_var_name: &str) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_root_folder()
}

/// Config file location inside a root folder
pub fn config_file_path(root_folder: &Path) -> PathBuf {
    root_folder.join(CONFIG_FILE_NAME)
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("objrel"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/objrel"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("objrel"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/objrel"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("objrel"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\objrel"))
    } else {
        PathBuf::from("./objrel_data")
    }
}
