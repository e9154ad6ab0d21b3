//! Configuration system for Statehouse
//!
//! Loads configuration from TOML files and environment variables.

mod types;

pub use types::*;

use crate::auth::{DEFAULT_CODE_LENGTH, MIN_CODE_LENGTH};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Environment variable overriding `auth.governor_secret`
pub const ENV_GOVERNOR_SECRET: &str = "STATEHOUSE_GOVERNOR_SECRET";

/// Environment variable overriding `auth.token_secret`
pub const ENV_TOKEN_SECRET: &str = "STATEHOUSE_TOKEN_SECRET";

/// Environment variable holding the storage passphrase
pub const ENV_STORAGE_KEY: &str = "STATEHOUSE_STORAGE_KEY";

/// Environment variable holding the password for CLI management commands
pub const ENV_PASSWORD: &str = "STATEHOUSE_PASSWORD";

/// Longest access code the service will generate
pub const MAX_CODE_LENGTH: usize = 32;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main Statehouse configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Authentication settings
    pub auth: AuthConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Load configuration from a string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Self::from_raw(raw)
    }

    /// Convert from raw TOML config to validated config
    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let server = raw.server.unwrap_or_default().into();
        let storage = raw.storage.unwrap_or_default().into();
        let auth: AuthConfig = raw.auth.unwrap_or_default().into();
        let logging = raw.logging.unwrap_or_default().try_into()?;

        auth.validate()?;

        Ok(Self {
            server,
            storage,
            auth,
            logging,
        })
    }

    /// Apply `STATEHOUSE_*` environment overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(secret) = non_empty_secret(lookup(ENV_GOVERNOR_SECRET)) {
            self.auth.governor_secret = Some(secret);
        }
        if let Some(secret) = non_empty_secret(lookup(ENV_TOKEN_SECRET)) {
            self.auth.token_secret = Some(secret);
        }
        self
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("statehouse")
            .join("config.toml")
    }

    /// Get the default storage path
    pub fn default_storage_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("statehouse")
            .join("statehouse.enc")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

fn non_empty_secret(value: Option<String>) -> Option<SecretString> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Allow cross-origin requests from any origin
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            cors: false,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path of the encrypted store file
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: Config::default_storage_path(),
        }
    }
}

/// Authentication settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret required to register the governor; registration is disabled when unset
    pub governor_secret: Option<SecretString>,
    /// Token signing secret; a random one is generated per process when unset
    pub token_secret: Option<SecretString>,
    /// Session token lifetime in hours
    pub token_ttl_hours: i64,
    /// Length of generated access codes
    pub access_code_length: usize,
    /// Bcrypt work factor
    pub bcrypt_cost: u32,
}

impl AuthConfig {
    /// Session token lifetime
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid(
                "auth.token_ttl_hours must be positive".to_string(),
            ));
        }
        if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&self.access_code_length) {
            return Err(ConfigError::Invalid(format!(
                "auth.access_code_length must be between {} and {}",
                MIN_CODE_LENGTH, MAX_CODE_LENGTH
            )));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Invalid(
                "auth.bcrypt_cost must be between 4 and 31".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            governor_secret: None,
            token_secret: None,
            token_ttl_hours: 24,
            access_code_length: DEFAULT_CODE_LENGTH,
            bcrypt_cost: crate::auth::DEFAULT_COST,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Format: "json" or "pretty"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format
    Pretty,
    /// JSON format
    Json,
}
