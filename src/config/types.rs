//! Raw configuration types for TOML parsing

use super::*;
use serde::Deserialize;

/// Raw configuration as parsed from TOML
#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub server: Option<RawServerConfig>,
    pub storage: Option<RawStorageConfig>,
    pub auth: Option<RawAuthConfig>,
    pub logging: Option<RawLoggingConfig>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RawServerConfig {
    pub bind: Option<String>,
    pub cors: Option<bool>,
}

impl From<RawServerConfig> for ServerConfig {
    fn from(raw: RawServerConfig) -> Self {
        let defaults = ServerConfig::default();
        Self {
            bind: raw.bind.unwrap_or(defaults.bind),
            cors: raw.cors.unwrap_or(defaults.cors),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawStorageConfig {
    pub path: Option<String>,
}

impl From<RawStorageConfig> for StorageConfig {
    fn from(raw: RawStorageConfig) -> Self {
        Self {
            path: raw
                .path
                .map(|p| expand_home(&p))
                .unwrap_or_else(Config::default_storage_path),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawAuthConfig {
    pub governor_secret: Option<String>,
    pub token_secret: Option<String>,
    pub token_ttl_hours: Option<i64>,
    pub access_code_length: Option<usize>,
    pub bcrypt_cost: Option<u32>,
}

impl From<RawAuthConfig> for AuthConfig {
    fn from(raw: RawAuthConfig) -> Self {
        let defaults = AuthConfig::default();
        Self {
            governor_secret: non_empty_secret(raw.governor_secret),
            token_secret: non_empty_secret(raw.token_secret),
            token_ttl_hours: raw.token_ttl_hours.unwrap_or(defaults.token_ttl_hours),
            access_code_length: raw
                .access_code_length
                .unwrap_or(defaults.access_code_length),
            bcrypt_cost: raw.bcrypt_cost.unwrap_or(defaults.bcrypt_cost),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawLoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl TryFrom<RawLoggingConfig> for LoggingConfig {
    type Error = ConfigError;

    fn try_from(raw: RawLoggingConfig) -> Result<Self, Self::Error> {
        let format = match raw.format.as_deref() {
            Some("pretty") | None => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown log format: {}",
                    other
                )))
            }
        };

        Ok(Self {
            level: raw.level.unwrap_or_else(|| "info".to_string()),
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
bind = "0.0.0.0:9000"
cors = true

[storage]
path = "/var/lib/statehouse/store.enc"

[auth]
governor_secret = "let-me-govern"
token_ttl_hours = 12
access_code_length = 10
bcrypt_cost = 10

[logging]
level = "debug"
format = "json"
"#;

        let config = Config::parse(toml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert!(config.server.cors);
        assert_eq!(
            config.storage.path,
            PathBuf::from("/var/lib/statehouse/store.enc")
        );
        assert_eq!(
            config
                .auth
                .governor_secret
                .as_ref()
                .map(|s| s.expose_secret().to_string()),
            Some("let-me-govern".to_string())
        );
        assert!(config.auth.token_secret.is_none());
        assert_eq!(config.auth.token_ttl(), chrono::Duration::hours(12));
        assert_eq!(config.auth.access_code_length, 10);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_minimal_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert!(!config.server.cors);
        assert!(config.auth.governor_secret.is_none());
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.auth.access_code_length, DEFAULT_CODE_LENGTH);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_empty_secret_is_unset() {
        let config = Config::parse("[auth]\ngovernor_secret = \"  \"\n").unwrap();
        assert!(config.auth.governor_secret.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::parse("[auth]\naccess_code_length = 3\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::parse("[auth]\ntoken_ttl_hours = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::parse("[logging]\nformat = \"xml\"\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::parse("[server\n"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::parse("[auth]\ngovernor_secret = \"from-file\"\n")
            .unwrap()
            .with_overrides(|key| match key {
                ENV_GOVERNOR_SECRET => Some("from-env".to_string()),
                ENV_TOKEN_SECRET => Some(String::new()),
                _ => None,
            });

        assert_eq!(
            config.auth.governor_secret.unwrap().expose_secret(),
            "from-env"
        );
        assert!(config.auth.token_secret.is_none());
    }

    #[test]
    fn test_home_expansion() {
        let config = Config::parse("[storage]\npath = \"~/statehouse.enc\"\n").unwrap();
        assert!(config.storage.path.ends_with("statehouse.enc"));
        assert!(!config.storage.path.starts_with("~"));
    }
}
