//! Configuration management for BodyMetrics.
//!
//! Settings are layered: built-in defaults, then an optional file, then
//! `BODYMETRICS__*` environment variables, then the flat variables the
//! service has always honored (`JWT_SECRET`, `API_KEY`, `PORT`, ...).

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BodyMetricsError, Result};
use crate::ratelimit::ClientKeyStrategy;

/// Prefix for structured environment overrides.
pub const ENV_PREFIX: &str = "BODYMETRICS";

/// Main configuration for the BodyMetrics service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Token and API key settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Outbound email configuration
    #[serde(default)]
    pub email: EmailConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// CORS origins; `*` allows any origin
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            allowed_origins: default_allowed_origins(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_body_bytes() -> usize {
    1 << 20
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for issued tokens. Required.
    #[serde(default)]
    pub jwt_secret: String,

    /// Shared key expected in `X-API-Key`. Empty disables the check.
    #[serde(default)]
    pub api_key: String,

    /// Lifetime of issued tokens
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,

    /// Lifetime of password reset codes
    #[serde(default = "default_reset_code_ttl_minutes")]
    pub reset_code_ttl_minutes: u64,

    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            api_key: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
            reset_code_ttl_minutes: default_reset_code_ttl_minutes(),
            min_password_len: default_min_password_len(),
        }
    }
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours * 3600)
    }

    pub fn reset_code_ttl(&self) -> Duration {
        Duration::from_secs(self.reset_code_ttl_minutes * 60)
    }
}

fn default_token_ttl_hours() -> u64 {
    30 * 24
}

fn default_reset_code_ttl_minutes() -> u64 {
    15
}

fn default_min_password_len() -> usize {
    6
}

/// A capacity/window pair for one limiter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRule {
    /// Accepted attempts per window
    pub capacity: usize,
    /// Window length in seconds
    pub window_secs: u64,
}

impl LimitRule {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Limit on login attempts per client
    #[serde(default = "default_login_rule")]
    pub login: LimitRule,

    /// Limit on password reset requests per client
    #[serde(default = "default_forgot_password_rule")]
    pub forgot_password: LimitRule,

    /// How clients are identified
    #[serde(default)]
    pub client_key: ClientKeyStrategy,

    /// Proxy hops trusted by the `trusted_proxy` strategy
    #[serde(default = "default_trusted_proxy_hops")]
    pub trusted_proxy_hops: usize,

    /// Interval for removing idle client windows. Unset keeps every window
    /// for the life of the process.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            login: default_login_rule(),
            forgot_password: default_forgot_password_rule(),
            client_key: ClientKeyStrategy::default(),
            trusted_proxy_hops: default_trusted_proxy_hops(),
            sweep_interval_secs: None,
        }
    }
}

fn default_login_rule() -> LimitRule {
    LimitRule {
        capacity: 5,
        window_secs: 15 * 60,
    }
}

fn default_forgot_password_rule() -> LimitRule {
    LimitRule {
        capacity: 3,
        window_secs: 60 * 60,
    }
}

fn default_trusted_proxy_hops() -> usize {
    1
}

/// Outbound email configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Resend API key. Without one, reset codes are only logged.
    #[serde(default)]
    pub resend_api_key: Option<String>,

    /// Sender address
    #[serde(default = "default_email_from")]
    pub from: String,

    /// Send endpoint
    #[serde(default = "default_email_endpoint")]
    pub endpoint: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            resend_api_key: None,
            from: default_email_from(),
            endpoint: default_email_endpoint(),
        }
    }
}

fn default_email_from() -> String {
    "BodyMetrics <no-reply@bodymetrics.local>".to_string()
}

fn default_email_endpoint() -> String {
    "https://api.resend.com/emails".to_string()
}

impl AppConfig {
    /// Load configuration from an optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::from_sources(path, None)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Build from an optional file plus structured `BODYMETRICS__*` variables.
    ///
    /// `env` replaces the process environment when given.
    pub fn from_sources(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let login = default_login_rule();
        let forgot = default_forgot_password_rule();

        let mut builder = Config::builder()
            .set_default("rate_limiting.login.capacity", login.capacity as u64)?
            .set_default("rate_limiting.login.window_secs", login.window_secs)?
            .set_default("rate_limiting.forgot_password.capacity", forgot.capacity as u64)?
            .set_default("rate_limiting.forgot_password.window_secs", forgot.window_secs)?;

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Apply the flat variable names used by existing deployments.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(key) = lookup("API_KEY") {
            self.auth.api_key = key;
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| BodyMetricsError::Config(format!("invalid PORT: {port}")))?;
            self.server.bind_addr.set_port(port);
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(key) = lookup("RESEND_API_KEY") {
            self.email.resend_api_key = Some(key);
        }
        if let Some(from) = lookup("EMAIL_FROM") {
            self.email.from = from;
        }
        Ok(())
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(BodyMetricsError::Config(
                "JWT_SECRET environment variable must be set".to_string(),
            ));
        }
        if self.auth.jwt_secret.len() < 32 {
            warn!("JWT secret is shorter than 32 characters");
        }
        if self.auth.api_key.is_empty() {
            warn!("No API key configured; X-API-Key checks are disabled");
        }
        if self.rate_limiting.login.capacity == 0 || self.rate_limiting.forgot_password.capacity == 0 {
            warn!("A rate limit capacity of zero rejects every request on that route");
        }
        Ok(())
    }
}
