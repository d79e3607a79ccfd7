//! Server configuration loading.
//!
//! The configuration lives in a JSON file (default
//! `~/.config/blockrun/config.json`, overridable with `BLOCKRUN_CONFIG_PATH`).
//! String values may reference environment variables as `${env:NAME}`. A few
//! `BLOCKRUN_*` variables override the file after interpolation.

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use blockrun_api::{BackendClientConfig, validate_base_url};
use blockrun_util::{InterpolationError, blockrun_config_dir, expand_tilde, interpolate_string};

pub const CONFIG_PATH_ENV: &str = "BLOCKRUN_CONFIG_PATH";
pub const BACKEND_URL_ENV: &str = "BLOCKRUN_BACKEND_URL";
pub const BIND_ADDRESS_ENV: &str = "BLOCKRUN_BIND_ADDRESS";
pub const DATABASE_PATH_ENV: &str = "BLOCKRUN_DATABASE_PATH";

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:3001";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Interpolation(#[from] InterpolationError),

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("invalid backend url: {0}")]
    InvalidBackendUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub backend_url: String,
    pub database_path: PathBuf,
    pub backend_connect_timeout_secs: u64,
    /// Applies to every backend call except live run streams.
    pub backend_request_timeout_secs: u64,
    pub allow_insecure_backend: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            database_path: default_database_path(),
            backend_connect_timeout_secs: 10,
            backend_request_timeout_secs: 60,
            allow_insecure_backend: false,
        }
    }
}

/// Get the default configuration file path.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }
    blockrun_config_dir().join("config.json")
}

pub fn default_database_path() -> PathBuf {
    blockrun_config_dir().join("blockrun.sqlite")
}

impl ServerConfig {
    /// Load from the default path. See [`ServerConfig::load_from_path`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&default_config_path())
    }

    /// Load, interpolate and apply environment overrides.
    ///
    /// A missing file yields the defaults. Validation is left to the caller so
    /// command-line overrides can be applied first.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            debug!(path = %path.display(), "config file not found; using defaults");
            Self::default()
        };

        config.interpolate()?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn interpolate(&mut self) -> Result<(), ConfigError> {
        self.bind_address = interpolate_string(&self.bind_address)?;
        self.backend_url = interpolate_string(&self.backend_url)?;
        let database = interpolate_string(&self.database_path.to_string_lossy())?;
        self.database_path = expand_tilde(&database);
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(value) = non_empty_env(BACKEND_URL_ENV) {
            self.backend_url = value;
        }
        if let Some(value) = non_empty_env(BIND_ADDRESS_ENV) {
            self.bind_address = value;
        }
        if let Some(value) = non_empty_env(DATABASE_PATH_ENV) {
            self.database_path = expand_tilde(&value);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_socket_addr()?;
        validate_base_url(&self.backend_url, self.allow_insecure_backend)
            .map_err(|e| ConfigError::InvalidBackendUrl(e.to_string()))?;
        Ok(())
    }

    pub fn bind_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.bind_address.clone()))
    }

    pub fn backend_client_config(&self) -> BackendClientConfig {
        let request_timeout = (self.backend_request_timeout_secs > 0).then(|| Duration::from_secs(self.backend_request_timeout_secs));
        BackendClientConfig::new(self.backend_url.clone())
            .with_connect_timeout(Duration::from_secs(self.backend_connect_timeout_secs))
            .with_request_timeout(request_timeout)
            .with_insecure(self.allow_insecure_backend)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        temp_env::with_vars_unset([BACKEND_URL_ENV, BIND_ADDRESS_ENV, DATABASE_PATH_ENV], || {
            let config = ServerConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
            assert_eq!(config, ServerConfig::default());
            config.validate().unwrap();
        });
    }

    #[test]
    fn file_values_are_interpolated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"backendUrl": "${env:BLOCKRUN_TEST_BACKEND}", "bindAddress": "0.0.0.0:8080", "databasePath": "/tmp/runs.sqlite"}"#,
        )
        .unwrap();

        temp_env::with_vars(
            [
                ("BLOCKRUN_TEST_BACKEND", Some("https://backend.example.com")),
                (BACKEND_URL_ENV, None),
                (BIND_ADDRESS_ENV, None),
                (DATABASE_PATH_ENV, None),
            ],
            || {
                let config = ServerConfig::load_from_path(&path).unwrap();
                assert_eq!(config.backend_url, "https://backend.example.com");
                assert_eq!(config.bind_socket_addr().unwrap().port(), 8080);
                assert_eq!(config.database_path, PathBuf::from("/tmp/runs.sqlite"));
                assert_eq!(config.backend_request_timeout_secs, 60);
            },
        );
    }

    #[test]
    fn missing_interpolation_variable_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"backendUrl": "${env:BLOCKRUN_TEST_UNSET}"}"#).unwrap();

        temp_env::with_var_unset("BLOCKRUN_TEST_UNSET", || {
            let err = ServerConfig::load_from_path(&path).unwrap_err();
            assert!(matches!(err, ConfigError::Interpolation(InterpolationError::MissingEnvVar { .. })));
        });
    }

    #[test]
    fn environment_overrides_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"backendUrl": "https://file.example.com"}"#).unwrap();

        temp_env::with_vars(
            [
                (BACKEND_URL_ENV, Some("https://env.example.com")),
                (BIND_ADDRESS_ENV, Some("127.0.0.1:9999")),
                (DATABASE_PATH_ENV, None),
            ],
            || {
                let config = ServerConfig::load_from_path(&path).unwrap();
                assert_eq!(config.backend_url, "https://env.example.com");
                assert_eq!(config.bind_address, "127.0.0.1:9999");
            },
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"backendURL": "https://x.example.com"}"#).unwrap();

        assert!(matches!(ServerConfig::load_from_path(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn plain_http_backend_needs_opt_in() {
        let mut config = ServerConfig {
            backend_url: "http://backend.internal:3001".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBackendUrl(_))));

        config.allow_insecure_backend = true;
        config.validate().unwrap();
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        let config = ServerConfig {
            bind_address: "localhost".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBindAddress(_))));
    }

    #[test]
    fn config_path_env_is_honoured() {
        temp_env::with_var(CONFIG_PATH_ENV, Some("/etc/blockrun/server.json"), || {
            assert_eq!(default_config_path(), PathBuf::from("/etc/blockrun/server.json"));
        });
    }
}
