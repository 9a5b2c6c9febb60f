//! Configuration parsing and structures

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::env::substitute_env_vars;

/// Default lifetime of a lock record
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Default wait between lock polls
pub const DEFAULT_LOCK_POLLING_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_APPROLE_LOGIN_PATH: &str = "auth/approle/login";
pub const DEFAULT_APPROLE_LOGOUT_PATH: &str = "auth/token/revoke-self";
pub const DEFAULT_PATH_PREFIX: &str = "certificates";

// =============================================================================
// Raw Config (Deserialized from YAML)
// =============================================================================

/// Raw configuration as deserialized from YAML.
/// This is converted to `Config` via `resolve()`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Secret store connection
    pub vault: RawVaultConfig,

    /// Locking behavior
    #[serde(default)]
    pub lock: RawLockConfig,
}

/// Secret store section
#[derive(Debug, Clone, Deserialize)]
pub struct RawVaultConfig {
    /// Address without API version or path, e.g. `https://vault.example.org:8201`
    pub address: String,

    /// Static token. When set it is always used and role login is never attempted.
    pub token: Option<String>,

    /// Role login credentials
    pub approle: Option<RawAppRoleConfig>,

    /// Mount path of the secrets engine, e.g. `secrets/production`
    pub secrets_path: String,

    /// Path inside the secrets engine where keys are placed
    pub path_prefix: Option<String>,

    /// Ignore TLS certificate errors
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// Role login section
#[derive(Debug, Clone, Deserialize)]
pub struct RawAppRoleConfig {
    pub role_id: String,
    pub secret_id: String,
    pub login_path: Option<String>,
    pub logout_path: Option<String>,
}

/// Lock section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLockConfig {
    /// How long a lock record stays valid (e.g. "5m")
    #[serde(default)]
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Wait between polls of a held lock (e.g. "5s")
    #[serde(default)]
    #[serde(with = "humantime_serde")]
    pub polling_interval: Option<Duration>,

    /// Acquire with check-and-set writes instead of read-then-write
    #[serde(default)]
    pub compare_and_swap: bool,
}

// =============================================================================
// Resolved Config (Ready for use)
// =============================================================================

/// Top-level configuration (resolved from RawConfig)
#[derive(Debug, Clone)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Storage configuration (fully resolved)
    pub storage: StorageConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// How the adapter authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthConfig {
    /// Pre-provisioned token
    Token(String),

    /// Role login
    AppRole(AppRoleConfig),
}

/// Role login configuration (resolved)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRoleConfig {
    pub role_id: String,
    pub secret_id: String,
    pub login_path: String,
    pub logout_path: String,
}

impl AppRoleConfig {
    /// Role credentials with the default login and logout paths
    pub fn new(role_id: impl Into<String>, secret_id: impl Into<String>) -> Self {
        Self {
            role_id: role_id.into(),
            secret_id: secret_id.into(),
            login_path: DEFAULT_APPROLE_LOGIN_PATH.to_string(),
            logout_path: DEFAULT_APPROLE_LOGOUT_PATH.to_string(),
        }
    }
}

/// Storage configuration (fully resolved)
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Secret store address
    pub address: String,

    /// Authentication method
    pub auth: AuthConfig,

    /// Mount path of the secrets engine
    pub secrets_path: String,

    /// Path inside the secrets engine where keys are placed
    pub path_prefix: String,

    /// Ignore TLS certificate errors
    pub insecure_skip_verify: bool,

    /// Lifetime of a lock record
    pub lock_timeout: Duration,

    /// Wait between polls of a held lock
    pub lock_polling_interval: Duration,

    /// Acquire locks with check-and-set writes
    pub lock_compare_and_swap: bool,
}

impl StorageConfig {
    /// Configuration with every optional setting at its default
    pub fn new(address: impl Into<String>, auth: AuthConfig, secrets_path: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            auth,
            secrets_path: secrets_path.into(),
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            insecure_skip_verify: false,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_polling_interval: DEFAULT_LOCK_POLLING_INTERVAL,
            lock_compare_and_swap: false,
        }
    }

    /// Validate the storage settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "vault.address cannot be empty".to_string(),
            ));
        }

        reqwest::Url::parse(&self.address).map_err(|e| {
            ConfigError::ValidationError(format!("vault.address {:?} is not a URL: {}", self.address, e))
        })?;

        if self.secrets_path.trim_matches('/').is_empty() {
            return Err(ConfigError::ValidationError(
                "vault.secrets_path cannot be empty".to_string(),
            ));
        }

        match &self.auth {
            AuthConfig::Token(token) if token.is_empty() => {
                return Err(ConfigError::ValidationError(
                    "vault.token cannot be empty".to_string(),
                ));
            }
            AuthConfig::AppRole(approle) if approle.role_id.is_empty() || approle.secret_id.is_empty() => {
                return Err(ConfigError::ValidationError(
                    "vault.approle requires both role_id and secret_id".to_string(),
                ));
            }
            _ => {}
        }

        if self.lock_polling_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "lock.polling_interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Resolution Logic
// =============================================================================

impl RawConfig {
    /// Resolve raw config into final config, applying defaults
    pub fn resolve(self) -> Result<Config, ConfigError> {
        let RawConfig {
            logging,
            vault,
            lock,
        } = self;

        let auth = Self::resolve_auth(vault.token, vault.approle)?;

        let storage = StorageConfig {
            address: vault.address,
            auth,
            secrets_path: vault.secrets_path,
            path_prefix: vault
                .path_prefix
                .unwrap_or_else(|| DEFAULT_PATH_PREFIX.to_string()),
            insecure_skip_verify: vault.insecure_skip_verify,
            lock_timeout: lock.timeout.unwrap_or(DEFAULT_LOCK_TIMEOUT),
            lock_polling_interval: lock
                .polling_interval
                .unwrap_or(DEFAULT_LOCK_POLLING_INTERVAL),
            lock_compare_and_swap: lock.compare_and_swap,
        };

        Ok(Config { logging, storage })
    }

    fn resolve_auth(
        token: Option<String>,
        approle: Option<RawAppRoleConfig>,
    ) -> Result<AuthConfig, ConfigError> {
        // A static token always wins over role login
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            return Ok(AuthConfig::Token(token));
        }

        let approle = approle.ok_or_else(|| {
            ConfigError::ValidationError(
                "vault needs either a token or approle credentials".to_string(),
            )
        })?;

        Ok(AuthConfig::AppRole(AppRoleConfig {
            role_id: approle.role_id,
            secret_id: approle.secret_id,
            login_path: approle
                .login_path
                .unwrap_or_else(|| DEFAULT_APPROLE_LOGIN_PATH.to_string()),
            logout_path: approle
                .logout_path
                .unwrap_or_else(|| DEFAULT_APPROLE_LOGOUT_PATH.to_string()),
        }))
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.clone(), e.to_string()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string, substituting `${VAR}` references
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let content = substitute_env_vars(content)?;
        let raw: RawConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        raw.resolve()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}
