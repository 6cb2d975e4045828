//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `GATEWAY_CONFIG` env var
//! 3. **Environment variables**: `GATEWAY__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`ServerConfig`]: HTTP server settings (bind address, concurrency, body limit)
//! - [`StoreConfig`]: `SQLite` registry store location
//! - [`TrustConfig`]: Stake roster source and resync backoff
//! - [`AuthConfig`]: Admin and root credentials, nonce freshness
//! - [`RateLimitConfig`]: Rolling-window caller limits
//! - [`PoolConfig`]: Validator health sweep, stake floor and allowlist
//! - [`RouterConfig`]: Forwarding timeouts and batch retry policy
//! - [`UptimeConfig`]: Synthetic organic probe settings
//! - [`LoggingConfig`]: Log level and format
//!
//! # Example
//!
//! ```toml
//! [server]
//! bind_port = 8000
//!
//! [auth]
//! admin_api_key = "change-me"
//! root_api_key = "root-key"
//!
//! [pool]
//! min_stake = 1000.0
//! allowlist = ["5F3sa2TJAWMqDhXG6jhV4N8ko9SxwGy8TpaNS1repo5EYjQX"]
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// HTTP server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address to bind the server to. Defaults to `0.0.0.0`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port number to listen on. Defaults to `8000`.
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// Maximum number of in-flight requests. Defaults to `256`.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Maximum accepted request body in bytes. Defaults to 1 MiB.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_bind_port() -> u16 {
    8000
}

fn default_max_concurrent_requests() -> usize {
    256
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Registry store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `SQLite` database URL. Defaults to `sqlite://./db/gateway.db`.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Connection pool size. Defaults to `8`.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite://./db/gateway.db".to_string()
}

fn default_max_connections() -> u32 {
    8
}

/// Trust source (stake roster) configuration.
///
/// The roster is fetched from `roster_url` and refreshed every `resync_interval_seconds`.
/// Failed refreshes back off exponentially with jitter, up to `max_retries` retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Network name passed to the roster service. Defaults to `"finney"`.
    #[serde(default = "default_network")]
    pub network: String,

    /// Subnet identifier passed to the roster service. Defaults to `52`.
    #[serde(default = "default_netuid")]
    pub netuid: u16,

    /// Roster endpoint returning `{"neurons":[{"hotkey":..,"stake":..}]}`.
    #[serde(default = "default_roster_url")]
    pub roster_url: String,

    /// Optional credential sent as the `Authorization` header.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Seconds between roster refreshes. Defaults to `60`.
    #[serde(default = "default_resync_interval_seconds")]
    pub resync_interval_seconds: u64,

    /// Roster request timeout in seconds. Defaults to `32`.
    #[serde(default = "default_trust_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Retries after a failed refresh before giving up. Defaults to `5`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds. Defaults to `500`.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Backoff ceiling in milliseconds. Defaults to `30000`.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Jitter factor (0.0-1.0) applied to each delay. Defaults to `0.25`.
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_network() -> String {
    "finney".to_string()
}

fn default_netuid() -> u16 {
    52
}

fn default_roster_url() -> String {
    "http://127.0.0.1:9103/api/metagraph/stakes".to_string()
}

fn default_resync_interval_seconds() -> u64 {
    60
}

fn default_trust_timeout_seconds() -> u64 {
    32
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_jitter_factor() -> f64 {
    0.25
}

/// Credential configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Credential required by `/api/user-register`.
    #[serde(default)]
    pub admin_api_key: String,

    /// Distinguished caller that bypasses rate limiting and request restrictions.
    #[serde(default)]
    pub root_api_key: Option<String>,

    /// Maximum age of a registration nonce in seconds. Defaults to `48`.
    #[serde(default = "default_max_nonce_age_seconds")]
    pub max_nonce_age_seconds: u64,
}

fn default_max_nonce_age_seconds() -> u64 {
    48
}

/// Rolling-window rate limit applied per caller credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests admitted per window. Defaults to `1`.
    #[serde(default = "default_rate_limit")]
    pub limit: u32,

    /// Window length in seconds. Defaults to `15`.
    #[serde(default = "default_rate_window_seconds")]
    pub window_seconds: u64,
}

fn default_rate_limit() -> u32 {
    1
}

fn default_rate_window_seconds() -> u64 {
    15
}

/// Validator pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Seconds between health sweeps. Defaults to `900`.
    #[serde(default = "default_refresh_interval_seconds")]
    pub refresh_interval_seconds: u64,

    /// Liveness probe timeout in seconds. Defaults to `4`.
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,

    /// Minimum stake for a validator to receive traffic. Defaults to `1000.0`.
    #[serde(default = "default_min_stake")]
    pub min_stake: f64,

    /// Validator identities allowed to register and serve. Empty disables the check.
    #[serde(default)]
    pub allowlist: Vec<String>,
}

fn default_refresh_interval_seconds() -> u64 {
    900
}

fn default_probe_timeout_seconds() -> u64 {
    4
}

fn default_min_stake() -> f64 {
    1000.0
}

/// Forwarding and batch retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Per-forward timeout in seconds. Defaults to `32`.
    #[serde(default = "default_forward_timeout_seconds")]
    pub forward_timeout_seconds: u64,

    /// Attempts per batch item. Defaults to `3`.
    #[serde(default = "default_batch_max_attempts")]
    pub batch_max_attempts: u32,

    /// Delay between batch item attempts in milliseconds. Defaults to `1000`.
    #[serde(default = "default_batch_retry_delay_ms")]
    pub batch_retry_delay_ms: u64,

    /// Organic contexts of this many characters or more are rejected. Defaults to `25000`.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

fn default_forward_timeout_seconds() -> u64 {
    32
}

fn default_batch_max_attempts() -> u32 {
    3
}

fn default_batch_retry_delay_ms() -> u64 {
    1000
}

fn default_max_context_chars() -> usize {
    25_000
}

/// Synthetic uptime probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeConfig {
    /// Whether the probe task runs. Defaults to `true`.
    #[serde(default = "default_uptime_enabled")]
    pub enabled: bool,

    /// Seconds between probes. Defaults to `60`.
    #[serde(default = "default_uptime_interval_seconds")]
    pub interval_seconds: u64,

    /// Samples returned in `recent_status`. Defaults to `10`.
    #[serde(default = "default_recent_samples")]
    pub recent_samples: u32,

    /// Length of the random probe context. Defaults to `1024`.
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,

    /// Tier sent with the probe. Defaults to `"universal"`.
    #[serde(default = "default_tier")]
    pub tier: String,

    /// Target model sent with the probe.
    #[serde(default = "default_target_model")]
    pub target_model: String,
}

fn default_uptime_enabled() -> bool {
    true
}

fn default_uptime_interval_seconds() -> u64 {
    60
}

fn default_recent_samples() -> u32 {
    10
}

fn default_context_chars() -> usize {
    1024
}

/// Tier used for synthetic and batch-compression work.
pub fn default_tier() -> String {
    "universal".to_string()
}

/// Model used for synthetic and batch-compression work.
pub fn default_target_model() -> String {
    "mistralai/Mistral-7B-Instruct-v0.2".to_string()
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Root application configuration containing all subsystem settings.
///
/// Loaded with the `GATEWAY` prefix for environment overrides using `__` as a separator,
/// e.g. `GATEWAY__RATE_LIMIT__LIMIT=5`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment. Defaults to `"development"`.
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub trust: TrustConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub uptime: UptimeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            max_concurrent_requests: default_max_concurrent_requests(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { database_url: default_database_url(), max_connections: default_max_connections() }
    }
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            netuid: default_netuid(),
            roster_url: default_roster_url(),
            api_key: None,
            resync_interval_seconds: default_resync_interval_seconds(),
            request_timeout_seconds: default_trust_timeout_seconds(),
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_api_key: String::new(),
            root_api_key: None,
            max_nonce_age_seconds: default_max_nonce_age_seconds(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { limit: default_rate_limit(), window_seconds: default_rate_window_seconds() }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            refresh_interval_seconds: default_refresh_interval_seconds(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
            min_stake: default_min_stake(),
            allowlist: Vec::new(),
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            forward_timeout_seconds: default_forward_timeout_seconds(),
            batch_max_attempts: default_batch_max_attempts(),
            batch_retry_delay_ms: default_batch_retry_delay_ms(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

impl Default for UptimeConfig {
    fn default() -> Self {
        Self {
            enabled: default_uptime_enabled(),
            interval_seconds: default_uptime_interval_seconds(),
            recent_samples: default_recent_samples(),
            context_chars: default_context_chars(),
            tier: default_tier(),
            target_model: default_target_model(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            trust: TrustConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            pool: PoolConfig::default(),
            router: RouterConfig::default(),
            uptime: UptimeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `GATEWAY__` prefix can override any configuration value.
    /// `GATEWAY_ALLOWLIST` accepts a comma-separated list of validator identities and
    /// replaces `pool.allowlist` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("environment", "development")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("GATEWAY").separator("__"))
            .build()?;

        let mut config: Self = config_builder.try_deserialize()?;

        if let Ok(allowlist) = std::env::var("GATEWAY_ALLOWLIST") {
            config.pool.allowlist = parse_allowlist(&allowlist);
        }

        Ok(config)
    }

    /// Loads configuration from `config/config.toml` with fallback to defaults.
    ///
    /// The config file path can be overridden using the `GATEWAY_CONFIG` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("GATEWAY_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Returns the parsed socket address for the HTTP server.
    ///
    /// # Errors
    ///
    /// Returns an error string if the address cannot be parsed into a valid [`SocketAddr`].
    ///
    /// [`SocketAddr`]: std::net::SocketAddr
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, String> {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
            .parse()
            .map_err(|_| {
                format!(
                    "Invalid socket address: {}:{}",
                    self.server.bind_address, self.server.bind_port
                )
            })
    }

    #[must_use]
    pub fn pool_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.pool.refresh_interval_seconds)
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.pool.probe_timeout_seconds)
    }

    #[must_use]
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.router.forward_timeout_seconds)
    }

    #[must_use]
    pub fn batch_retry_delay(&self) -> Duration {
        Duration::from_millis(self.router.batch_retry_delay_ms)
    }

    #[must_use]
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_seconds)
    }

    #[must_use]
    pub fn trust_resync_interval(&self) -> Duration {
        Duration::from_secs(self.trust.resync_interval_seconds)
    }

    #[must_use]
    pub fn uptime_interval(&self) -> Duration {
        Duration::from_secs(self.uptime.interval_seconds)
    }

    #[must_use]
    pub fn max_nonce_age(&self) -> Duration {
        Duration::from_secs(self.auth.max_nonce_age_seconds)
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_port == 0 {
            return Err("Bind port must be greater than 0".to_string());
        }

        if self.server.max_concurrent_requests == 0 {
            return Err("Max concurrent requests must be greater than 0".to_string());
        }

        if self.auth.admin_api_key.is_empty() {
            return Err("Admin API key must be configured".to_string());
        }

        if self.uptime.enabled && self.auth.root_api_key.as_deref().is_none_or(str::is_empty) {
            return Err("Root API key is required when uptime monitoring is enabled".to_string());
        }

        match url::Url::parse(&self.trust.roster_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            _ => return Err(format!("Invalid roster URL: {}", self.trust.roster_url)),
        }

        if self.rate_limit.limit == 0 || self.rate_limit.window_seconds == 0 {
            return Err("Rate limit and window must be greater than 0".to_string());
        }

        if self.pool.refresh_interval_seconds == 0 || self.pool.probe_timeout_seconds == 0 {
            return Err("Pool refresh interval and probe timeout must be greater than 0".to_string());
        }

        if self.router.forward_timeout_seconds == 0 || self.router.batch_max_attempts == 0 {
            return Err("Forward timeout and batch attempts must be greater than 0".to_string());
        }

        if self.trust.resync_interval_seconds == 0 || self.uptime.interval_seconds == 0 {
            return Err("Resync and uptime intervals must be greater than 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.trust.jitter_factor) {
            return Err("Jitter factor must be between 0.0 and 1.0".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}

/// Splits a comma-separated identity list, ignoring blanks.
#[must_use]
pub fn parse_allowlist(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
}
