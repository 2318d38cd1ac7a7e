//! Application configuration.

use crate::error::{AppError, AppResult};
use cpred_api::{CheckoutConfig, DEFAULT_TIER};
use cpred_core::{validate_stream_url, Origin};
use cpred_dashboard::DashboardConfig;
use cpred_ws::StreamConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file used when neither `--config` nor `CPRED_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CPRED_CONFIG";

/// Environment variable holding the session cookie header.
pub const COOKIE_ENV: &str = "CPRED_COOKIE";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend origin, e.g. `https://predictor.example.com`.
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Streaming client configuration.
    #[serde(default)]
    pub stream: StreamSection,
    /// REST client configuration.
    #[serde(default)]
    pub http: HttpConfig,
    /// Session and bearer credentials.
    #[serde(default)]
    pub credentials: CredentialsConfig,
    /// Subscription checkout configuration.
    #[serde(default)]
    pub checkout: CheckoutSection,
    /// Dashboard configuration.
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Streaming configuration subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSection {
    /// Explicit stream URL. Derived from the origin (`/ws`) when unset.
    #[serde(default)]
    pub url: Option<String>,
    /// Fixed delay before reconnecting (ms).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            url: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl From<StreamSection> for StreamConfig {
    fn from(cfg: StreamSection) -> Self {
        // An empty URL is filled in from the origin by AppConfig::stream_config.
        StreamConfig::new(cfg.url.unwrap_or_default())
            .with_reconnect_delay(Duration::from_millis(cfg.reconnect_delay_ms))
    }
}

/// REST client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout (ms).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Credential sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Session cookie header (`name=value; ...`). `CPRED_COOKIE` takes precedence.
    #[serde(default)]
    pub cookie: Option<String>,
    /// File holding the bearer credential used for checkout.
    #[serde(default = "default_token_path")]
    pub token_path: String,
}

fn default_token_path() -> String {
    ".cpred/token".to_string()
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            cookie: None,
            token_path: default_token_path(),
        }
    }
}

impl CredentialsConfig {
    /// Cookie header from the environment, falling back to the config file.
    pub fn resolve_cookie(&self) -> Option<String> {
        std::env::var(COOKIE_ENV)
            .ok()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| self.cookie.clone())
    }
}

/// Checkout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSection {
    #[serde(default)]
    pub publishable_key: String,
    #[serde(default = "default_redirect_base")]
    pub redirect_base: String,
    /// Tier used when the command line doesn't name one.
    #[serde(default = "default_tier")]
    pub default_tier: String,
}

fn default_redirect_base() -> String {
    CheckoutConfig::default().redirect_base
}

fn default_tier() -> String {
    DEFAULT_TIER.to_string()
}

impl Default for CheckoutSection {
    fn default() -> Self {
        Self {
            publishable_key: String::new(),
            redirect_base: default_redirect_base(),
            default_tier: default_tier(),
        }
    }
}

impl From<&CheckoutSection> for CheckoutConfig {
    fn from(cfg: &CheckoutSection) -> Self {
        Self {
            publishable_key: cfg.publishable_key.clone(),
            redirect_base: cfg.redirect_base.clone(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter directive (overridden by `RUST_LOG`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    cpred_telemetry::logging::DEFAULT_FILTER.to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            stream: StreamSection::default(),
            http: HttpConfig::default(),
            credentials: CredentialsConfig::default(),
            checkout: CheckoutSection::default(),
            dashboard: DashboardConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Config path: CLI arg > `CPRED_CONFIG` > default.
    pub fn resolve_path(cli: Option<String>) -> String {
        cli.or_else(|| std::env::var(CONFIG_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load from `path`, or use defaults if the file doesn't exist.
    pub fn load(path: &str) -> AppResult<Self> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        self.parsed_origin()?;
        if let Some(url) = &self.stream.url {
            validate_stream_url(url).map_err(|e| AppError::Config(e.to_string()))?;
        }
        if self.stream.reconnect_delay_ms == 0 {
            return Err(AppError::Config(
                "stream.reconnect_delay_ms must be positive".to_string(),
            ));
        }
        if self.http.timeout_ms == 0 {
            return Err(AppError::Config("http.timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn parsed_origin(&self) -> AppResult<Origin> {
        Origin::parse(&self.origin)
            .map_err(|e| AppError::Config(format!("Invalid origin {:?}: {e}", self.origin)))
    }

    /// Stream configuration with the URL derived from `origin` unless set.
    pub fn stream_config(&self, origin: &Origin) -> StreamConfig {
        let mut config = StreamConfig::from(self.stream.clone());
        if config.url.is_empty() {
            config.url = origin.stream_url();
        }
        config
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http.timeout_ms)
    }
}
