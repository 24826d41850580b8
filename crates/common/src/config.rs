//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use url::Url;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// External consensus scoring service.
    #[serde(default)]
    pub consensus: ConsensusConfig,
    /// Inbound webhook verification.
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Shared secrets for privileged routes.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Consensus scoring service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusConfig {
    /// Base URL of the scoring service. Recalculation is disabled when unset.
    #[serde(default)]
    pub service_url: Option<Url>,
    /// Value sent in the `X-API-Key` header.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Upper bound for a single recalculation request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Interval between scheduled batch recalculations.
    #[serde(default = "default_recalculation_interval_secs")]
    pub recalculation_interval_secs: u64,
    /// Whether the periodic batch runs inside the server process.
    #[serde(default = "default_true")]
    pub scheduler_enabled: bool,
}

/// Webhook verification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Shared HMAC secret. Every webhook is rejected when unset.
    #[serde(default)]
    pub secret: Option<String>,
    /// Maximum accepted clock skew for the signed timestamp.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

/// Shared secrets for cron and admin callers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Bearer token expected on the cron route. The route is open when unset.
    #[serde(default)]
    pub cron_secret: Option<String>,
    /// Bearer token granting platform-admin access to every model.
    #[serde(default)]
    pub admin_token: Option<String>,
    /// Header carrying the signed-in account id, set by the first-party
    /// frontend proxy. Sessions are disabled when unset.
    #[serde(default)]
    pub session_header: Option<String>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            recalculation_interval_secs: default_recalculation_interval_secs(),
            scheduler_enabled: true,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            max_age_secs: default_max_age_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_recalculation_interval_secs() -> u64 {
    3600
}

const fn default_max_age_secs() -> u64 {
    300
}

const fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `OSCCAI_ENV`)
    /// 4. Environment variables with `OSCCAI__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("OSCCAI_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("OSCCAI")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("OSCCAI")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
