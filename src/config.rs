//! Configuration loading and constants.
//!
//! Loads application configuration from a TOML file, then applies the
//! environment variable overrides understood by the service scaffold
//! (`SERVICE_NAME`, `PORT`, `DATABASE_URL`, `REDIS_ENABLED`, ...).
//! `AppConfig` is the root configuration struct containing all settings.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "vigil=debug,tower_http=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Service name reported when none is configured
pub const DEFAULT_SERVICE_NAME: &str = "rs-service";

/// Deployment environment reported when none is configured
pub const DEFAULT_ENVIRONMENT: &str = "development";

// =============================================================================
// Dependency Timeouts
// =============================================================================

/// Upper bound on the one-shot connect attempt made at startup
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;

/// Upper bound on a single health probe round-trip
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1000;

/// Maximum pooled connections to the relational store
pub const DEFAULT_MAX_DB_CONNECTIONS: u32 = 5;

// =============================================================================
// Shutdown
// =============================================================================

/// How long in-flight requests get to finish once shutdown starts
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    /// HTTP listener configuration
    #[serde(default)]
    pub http: HttpServerConfig,
    /// Relational store (PostgreSQL)
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Key-value cache store (Redis)
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Service identity
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "ServiceConfig::default_name")]
    pub name: String,
    /// Deployment environment label ("development", "production", ...)
    #[serde(default = "ServiceConfig::default_environment")]
    pub environment: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            environment: Self::default_environment(),
        }
    }
}

impl ServiceConfig {
    fn default_name() -> String {
        DEFAULT_SERVICE_NAME.to_string()
    }

    fn default_environment() -> String {
        DEFAULT_ENVIRONMENT.to_string()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "HttpServerConfig::default_host")]
    pub host: String,
    #[serde(default = "HttpServerConfig::default_port")]
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

impl HttpServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    /// Address string suitable for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Relational store settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "DatabaseConfig::default_enabled")]
    pub enabled: bool,
    pub url: Option<String>,
    #[serde(default = "DatabaseConfig::default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            url: None,
            max_connections: Self::default_max_connections(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl DatabaseConfig {
    fn default_enabled() -> bool {
        false
    }

    fn default_max_connections() -> u32 {
        DEFAULT_MAX_DB_CONNECTIONS
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Cache store settings
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub enabled: bool,
    pub url: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl RedisConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Per-probe timeout in milliseconds
    #[serde(default = "HealthConfig::default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: Self::default_probe_timeout(),
        }
    }
}

impl HealthConfig {
    fn default_probe_timeout() -> u64 {
        DEFAULT_PROBE_TIMEOUT_MS
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// Drain deadline in seconds (default: 5)
    #[serde(default = "ShutdownConfig::default_drain_timeout")]
    pub drain_timeout_seconds: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_seconds: Self::default_drain_timeout(),
        }
    }
}

impl ShutdownConfig {
    fn default_drain_timeout() -> u64 {
        DEFAULT_DRAIN_TIMEOUT_SECS
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, apply process environment
    /// overrides and validate the result.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_with_env(&contents, |key| std::env::var(key).ok())
    }

    /// Like [`AppConfig::load`], but a missing file yields the built-in
    /// defaults instead of an error. Used for the default config path.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Self::from_toml_with_env("", |key| std::env::var(key).ok())
        }
    }

    /// Parse TOML and apply overrides from the given variable lookup.
    pub fn from_toml_with_env<F>(contents: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: AppConfig = toml::from_str(contents)?;
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables onto file settings. Empty values are
    /// treated as unset.
    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(name) = var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Some(env) = var("ENV") {
            self.service.environment = env;
        }
        if let Some(port) = var("PORT") {
            self.http.port = port
                .parse()
                .map_err(|_| ConfigError::Validation(format!("PORT is not a valid port: {port}")))?;
        }

        if let Some(url) = var("DATABASE_URL") {
            self.database.url = Some(url);
            self.database.enabled = true;
        } else if ["POSTGRES_USER", "POSTGRES_PASSWORD", "POSTGRES_HOST", "POSTGRES_DB"]
            .iter()
            .any(|key| var(key).is_some())
        {
            self.database.url = Some(format!(
                "postgresql://{}:{}@{}:5432/{}",
                var("POSTGRES_USER").unwrap_or_else(|| "postgres".to_string()),
                var("POSTGRES_PASSWORD").unwrap_or_else(|| "postgres".to_string()),
                var("POSTGRES_HOST").unwrap_or_else(|| "postgres".to_string()),
                var("POSTGRES_DB").unwrap_or_else(|| "nself".to_string()),
            ));
            self.database.enabled = true;
        }
        if let Some(enabled) = var("DATABASE_ENABLED") {
            self.database.enabled = parse_flag("DATABASE_ENABLED", &enabled)?;
        }

        if let Some(enabled) = var("REDIS_ENABLED") {
            self.redis.enabled = parse_flag("REDIS_ENABLED", &enabled)?;
        }
        if let Some(url) = var("REDIS_URL") {
            self.redis.url = Some(url);
        } else if let Some(host) = var("REDIS_HOST") {
            self.redis.url = Some(format!("redis://{host}:6379"));
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::Validation(
                "http.port must be non-zero".to_string(),
            ));
        }
        if self.shutdown.drain_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "shutdown.drain_timeout_seconds must be non-zero".to_string(),
            ));
        }
        if self.health.probe_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "health.probe_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.database.connect_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "database.connect_timeout_seconds must be non-zero".to_string(),
            ));
        }
        if self.redis.connect_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "redis.connect_timeout_seconds must be non-zero".to_string(),
            ));
        }
        if self.database.enabled && self.database.url.is_none() {
            return Err(ConfigError::Validation(
                "database is enabled but no url is configured (set database.url or DATABASE_URL)"
                    .to_string(),
            ));
        }
        if self.redis.enabled && self.redis.url.is_none() {
            return Err(ConfigError::Validation(
                "redis is enabled but no url is configured (set redis.url or REDIS_URL)"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Validation(format!(
            "{key} must be true or false, got {value}"
        ))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}
