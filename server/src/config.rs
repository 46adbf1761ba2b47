//! Environment-backed server configuration.
//!
//! Most settings have defaults. Override with `PLANBOOK_*` environment
//! variables; the provider credential itself lives in `OPENAI_API_KEY`
//! and is read by the provider adapter, not here.

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Directory for catalog and embedding storage. Default: `./.data`.
    pub data_dir: PathBuf,

    /// Token gating mutating endpoints. Default: unset (gated endpoints
    /// disabled).
    pub admin_token: Option<String>,

    /// Embedding model override. Default: the provider's default model.
    pub model: Option<String>,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid port {value:?}")]
    InvalidPort { value: String },

    #[error("invalid bind address {value:?}")]
    InvalidBindAddr { value: String },

    #[error("{path} exists but is not a directory")]
    NotADirectory { path: String },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            data_dir: PathBuf::from("./.data"),
            admin_token: None,
            model: None,
        }
    }
}

impl ServerConfig {
    const ENV_PORT: &'static str = "PLANBOOK_PORT";
    const ENV_BIND_ADDR: &'static str = "PLANBOOK_BIND_ADDR";
    const ENV_DATA_DIR: &'static str = "PLANBOOK_DATA_DIR";
    const ENV_ADMIN_TOKEN: &'static str = "PLANBOOK_ADMIN_TOKEN";
    const ENV_MODEL: &'static str = "PLANBOOK_EMBEDDING_MODEL";

    /// Loads configuration from environment variables (falling back to
    /// defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match env::var(Self::ENV_PORT) {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidPort { value })?,
            Err(_) => defaults.port,
        };

        let bind_addr = match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddr { value })?,
            Err(_) => defaults.bind_addr,
        };

        let data_dir = env::var(Self::ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        Ok(Self {
            port,
            bind_addr,
            data_dir,
            admin_token: Self::optional(Self::ENV_ADMIN_TOKEN),
            model: Self::optional(Self::ENV_MODEL),
        })
    }

    /// Validates basic invariants (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.exists() && !self.data_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.data_dir.display().to_string(),
            });
        }
        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"`.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Directory holding the expectation catalog.
    pub fn catalog_dir(&self) -> PathBuf {
        self.data_dir.join("catalog")
    }

    /// Directory holding embedding records.
    pub fn embeddings_dir(&self) -> PathBuf {
        self.data_dir.join("embeddings")
    }

    fn optional(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
