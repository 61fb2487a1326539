//! Configuration management.
//!
//! Settings are read from an optional TOML file and then from environment
//! variables prefixed with `TEACHTRACK` (nested keys separated by `__`,
//! e.g. `TEACHTRACK__AUTH__JWT_SECRET`). Durations accept humantime strings
//! such as `"10s"` or `"24h"`.

use serde::Deserialize;
use std::time::Duration;

use crate::error::{Result, TrackError};

const ENV_PREFIX: &str = "TEACHTRACK";

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,

    /// Read-through cache configuration
    #[serde(default)]
    pub cache: CacheSettings,

    /// Token issuing configuration
    pub auth: AuthSettings,

    /// Pagination defaults
    #[serde(default)]
    pub pagination: PaginationSettings,

    /// Tenant resolution configuration
    #[serde(default)]
    pub tenant: TenantSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// CORS configuration
    #[serde(default)]
    pub cors: CorsSettings,

    /// Operator account seeded at startup
    #[serde(default)]
    pub bootstrap: Option<BootstrapSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Bound on establishing or acquiring a connection
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Run embedded migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Per-command timeout
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            command_timeout: default_command_timeout(),
        }
    }
}

/// Which cache backend the server wires in.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Backend selection
    #[serde(default)]
    pub backend: CacheBackendKind,

    /// TTL for entity entries
    #[serde(default = "default_ttl", with = "humantime_serde")]
    pub default_ttl: Duration,

    /// TTL for the content bucket (listings and documents)
    #[serde(default = "default_ttl", with = "humantime_serde")]
    pub content_ttl: Duration,

    /// Optional prefix prepended to every key
    #[serde(default)]
    pub namespace_prefix: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::default(),
            default_ttl: default_ttl(),
            content_ttl: default_ttl(),
            namespace_prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// HMAC secret used to sign tokens
    pub jwt_secret: String,

    /// Lifetime of issued tokens
    #[serde(default = "default_token_ttl", with = "humantime_serde")]
    pub token_ttl: Duration,

    /// Clock skew tolerated when checking expiry
    #[serde(default = "default_leeway", with = "humantime_serde")]
    pub leeway: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationSettings {
    #[serde(default = "default_page_limit")]
    pub default_limit: u32,

    #[serde(default = "default_max_page_limit")]
    pub max_limit: u32,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_page_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantSettings {
    /// Number of trailing host labels that form the base domain
    #[serde(default = "default_base_domain_labels")]
    pub base_domain_labels: usize,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            base_domain_labels: default_base_domain_labels(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for production/structured logging
    Json,
    /// Pretty format for development
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g. `info,teachtrack_core=debug`)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Include file and line in log records
    #[serde(default)]
    pub include_location: bool,

    /// Install the Prometheus recorder and serve `/metrics`
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            include_location: false,
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Platform school and SUPER_ADMIN account created on first start.
///
/// Operators log in through this school's subdomain like any other user.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapSettings {
    pub subdomain: String,
    #[serde(default = "default_bootstrap_name")]
    pub school_name: String,
    pub phone_number: String,
    pub password: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> Duration { Duration::from_secs(10) }
fn default_run_migrations() -> bool { true }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_command_timeout() -> Duration { Duration::from_secs(2) }
fn default_ttl() -> Duration { Duration::from_secs(600) }
fn default_token_ttl() -> Duration { Duration::from_secs(24 * 60 * 60) }
fn default_leeway() -> Duration { Duration::from_secs(30) }
fn default_page_limit() -> u32 { 10 }
fn default_max_page_limit() -> u32 { 100 }
fn default_base_domain_labels() -> usize { 2 }
fn default_log_level() -> String { "info".to_string() }
fn default_metrics_enabled() -> bool { true }
fn default_bootstrap_name() -> String { "Platform".to_string() }
fn default_allowed_origins() -> Vec<String> { vec!["http://127.0.0.1:5173".to_string()] }

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(Self::environment())
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides on top.
    pub fn from_file(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(Self::environment())
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("cors.allowed_origins")
            .try_parsing(true)
    }

    /// Reject settings that would make the server misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(TrackError::configuration("auth.jwt_secret must not be empty"));
        }
        if self.cache.default_ttl.is_zero() || self.cache.content_ttl.is_zero() {
            return Err(TrackError::configuration("cache TTLs must be greater than zero"));
        }
        if self.pagination.default_limit == 0 || self.pagination.max_limit == 0 {
            return Err(TrackError::configuration("pagination limits must be positive"));
        }
        if self.pagination.default_limit > self.pagination.max_limit {
            return Err(TrackError::configuration(
                "pagination.default_limit exceeds pagination.max_limit",
            ));
        }
        Ok(())
    }

    /// Socket address the HTTP server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
