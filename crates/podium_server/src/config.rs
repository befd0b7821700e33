//! Server configuration.
//!
//! Values come from, in increasing priority: [`ServerConfig::default`], an
//! optional TOML file, `PODIUM_*` environment variables and the command line.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while assembling a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// Configuration for the `PodiumServer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// The host address to bind the server to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Public base URL resources are identified under. Derived from host and
    /// port when unset.
    pub base_url: Option<String>,
    /// Directory of the sled database. Resources are kept in memory when unset.
    pub data_dir: Option<PathBuf>,
    /// If `true`, Cross-Origin Resource Sharing (CORS) headers will be enabled.
    pub cors_enabled: bool,
    /// If `true`, HTTP request tracing will be enabled for debugging.
    pub tracing: bool,
    /// Largest request body accepted, in bytes.
    pub max_body_size: usize,
    /// How long a request may wait for a resource lock, in milliseconds.
    pub lock_timeout_ms: Option<u64>,
    pub auth: AuthConfig,
    pub metrics: MetricsConfig,
    pub identity: IdentityConfig,
}

/// Token and access settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for signing access tokens.
    pub jwt_secret: String,
    /// Access token lifetime in hours.
    pub token_expiration_hours: i64,
    /// Lets unauthenticated agents read resources.
    pub public_read: bool,
    /// Creates an `admin` account with this password at startup.
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Path the Prometheus exposition is served at.
    pub endpoint: String,
}

/// External identity verification and login interactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base URL of the identity service. Verification is disabled when unset.
    pub service_url: Option<String>,
    /// Upper bound for one complete verification, in seconds.
    pub timeout_secs: u64,
    /// Delay between two collect polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Address reported to the identity service as the end user's.
    pub end_user_ip: String,
    /// Lifetime of a login interaction, in seconds.
    pub interaction_ttl_secs: u64,
}

impl Default for ServerConfig {
    /// Returns a default configuration suitable for local development.
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            base_url: None,
            data_dir: None,
            cors_enabled: true,
            tracing: true,
            max_body_size: podium_store::representation::DEFAULT_MAX_BODY_SIZE,
            lock_timeout_ms: Some(30_000),
            auth: AuthConfig::default(),
            metrics: MetricsConfig::default(),
            identity: IdentityConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "podium-secret-key-change-in-production".to_string(),
            token_expiration_hours: 24,
            public_read: true,
            admin_password: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "/metrics".to_string(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            timeout_secs: 180,
            poll_interval_ms: 2_000,
            end_user_ip: "127.0.0.1".to_string(),
            interaction_ttl_secs: 3_600,
        }
    }
}

impl ServerConfig {
    /// Returns a configuration that binds to all network interfaces.
    pub fn public() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            ..Default::default()
        }
    }

    /// Sets the port for the server to listen on.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the host address for the server.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.auth.jwt_secret = secret.into();
        self
    }

    pub fn with_identity_service(mut self, url: impl Into<String>) -> Self {
        self.identity.service_url = Some(url.into());
        self
    }

    /// Parses a configuration from TOML. Missing keys keep their defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Applies `PODIUM_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `PODIUM_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PODIUM_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PODIUM_PORT") {
            self.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PODIUM_PORT".to_string(),
                value: port,
            })?;
        }
        if let Some(base_url) = lookup("PODIUM_BASE_URL") {
            self.base_url = Some(base_url);
        }
        if let Some(secret) = lookup("PODIUM_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(dir) = lookup("PODIUM_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        Ok(self)
    }

    /// Returns the base URL with exactly one trailing slash.
    pub fn base_url(&self) -> String {
        let base = match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        };
        format!("{}/", base)
    }

    /// Returns the socket address string the server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
