//! Configuration loading for the auth registry.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `AUTH_REGISTRY_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::{BUILTIN_PROVIDER_ID, SHIB_PROVIDER_ID};

const ENV_PREFIX: &str = "AUTH_REGISTRY_";

/// Application configuration derived from `AUTH_REGISTRY_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// Provider accounts are converted away from
    #[serde(default = "default_external_provider_id")]
    pub external_provider_id: String,
    /// Provider accounts are converted to
    #[serde(default = "default_builtin_provider_id")]
    pub builtin_provider_id: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            external_provider_id: default_external_provider_id(),
            builtin_provider_id: default_builtin_provider_id(),
        }
    }
}

impl AppConfig {
    /// Returns a redacted JSON representation (database password is redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        config.database_url = redact_url_password(&config.database_url);
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error on unusable settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidDbMaxConnections {
                value: self.db_max_connections,
            });
        }

        if self.external_provider_id.trim().is_empty() {
            return Err(ConfigError::EmptyProviderId {
                key: "EXTERNAL_PROVIDER_ID",
            });
        }
        if self.builtin_provider_id.trim().is_empty() {
            return Err(ConfigError::EmptyProviderId {
                key: "BUILTIN_PROVIDER_ID",
            });
        }
        if self.external_provider_id == self.builtin_provider_id {
            return Err(ConfigError::SameProviderIds {
                value: self.builtin_provider_id.clone(),
            });
        }

        Ok(())
    }
}

/// Replaces the password component of a connection URL with `[REDACTED]`.
fn redact_url_password(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((credentials, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match credentials.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:[REDACTED]@{host}"),
        None => url.to_string(),
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://auth-registry.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_external_provider_id() -> String {
    SHIB_PROVIDER_ID.to_string()
}

fn default_builtin_provider_id() -> String {
    BUILTIN_PROVIDER_ID.to_string()
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid value '{value}' for {key}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("database max connections must be at least 1, got {value}")]
    InvalidDbMaxConnections { value: u32 },
    #[error("{key} must not be empty")]
    EmptyProviderId { key: &'static str },
    #[error("external and builtin provider ids must differ, both are '{value}'")]
    SameProviderIds { value: String },
}

/// Loads configuration using layered `.env` files and `AUTH_REGISTRY_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env`, `.env.local`, `.env.<profile>`, `.env.<profile>.local`
    /// in that order, then the process environment, later layers winning.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let log_level = take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_string(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url =
            take_string(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = take_number(&mut layered, "DB_MAX_CONNECTIONS")?
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = take_number(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")?
            .unwrap_or_else(default_db_acquire_timeout_ms);
        let external_provider_id = take_string(&mut layered, "EXTERNAL_PROVIDER_ID")
            .unwrap_or_else(default_external_provider_id);
        let builtin_provider_id = take_string(&mut layered, "BUILTIN_PROVIDER_ID")
            .unwrap_or_else(default_builtin_provider_id);

        let config = AppConfig {
            profile,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            external_provider_id,
            builtin_provider_id,
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(values: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    values
        .remove(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn take_number<T: std::str::FromStr>(
    values: &mut BTreeMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match take_string(values, key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        None => Ok(None),
    }
}
