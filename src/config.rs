/*
 * Responsibility
 * - load environment variables (.env via dotenvy) into an immutable Config
 * - validate values (startup fails on missing/invalid settings)
 */
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::services::ownership::MatchPolicy;
use crate::services::rate_limit::{MAX_WINDOW, RateLimitConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://localhost:3001";

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,
    pub body_limit_bytes: usize,
    pub request_timeout: Duration,

    // None => in-memory post store
    pub database_url: Option<String>,

    pub jwt_secret: String,
    pub jwt_leeway_seconds: u64,

    pub rate_limit: RateLimitConfig,
    pub rate_limit_sweep_interval: Duration,
    pub trusted_proxy_hops: usize,

    pub ownership_match: MatchPolicy,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print the signing secret or the database credentials
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("body_limit_bytes", &self.body_limit_bytes)
            .field("request_timeout", &self.request_timeout)
            .field("database", &self.database_url.is_some())
            .field("jwt_leeway_seconds", &self.jwt_leeway_seconds)
            .field("rate_limit", &self.rate_limit)
            .field("rate_limit_sweep_interval", &self.rate_limit_sweep_interval)
            .field("trusted_proxy_hops", &self.trusted_proxy_hops)
            .field("ownership_match", &self.ownership_match)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source (tests inject a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = parse_or(&lookup, "PORT", 3020)?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let body_limit_bytes = parse_or(&lookup, "BODY_LIMIT_BYTES", 10 * 1024 * 1024usize)?;
        let request_timeout_seconds = parse_or(&lookup, "REQUEST_TIMEOUT_SECONDS", 30u64)?;
        if request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid("REQUEST_TIMEOUT_SECONDS"));
        }

        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let jwt_leeway_seconds = parse_or(&lookup, "JWT_LEEWAY_SECONDS", 0u64)?;

        let max_requests = parse_or(&lookup, "RATE_LIMIT_MAX_REQUESTS", 100u32)?;
        let window_seconds = parse_or(&lookup, "RATE_LIMIT_WINDOW_SECONDS", 15 * 60u64)?;
        let max_clients = parse_or(&lookup, "RATE_LIMIT_MAX_CLIENTS", 10_000usize)?;
        let sweep_seconds = parse_or(&lookup, "RATE_LIMIT_SWEEP_SECONDS", 60u64)?;

        if max_requests == 0 {
            return Err(ConfigError::Invalid("RATE_LIMIT_MAX_REQUESTS"));
        }
        if window_seconds == 0 || window_seconds > MAX_WINDOW.as_secs() {
            return Err(ConfigError::Invalid("RATE_LIMIT_WINDOW_SECONDS"));
        }
        if max_clients == 0 {
            return Err(ConfigError::Invalid("RATE_LIMIT_MAX_CLIENTS"));
        }
        if sweep_seconds == 0 || sweep_seconds > MAX_WINDOW.as_secs() {
            return Err(ConfigError::Invalid("RATE_LIMIT_SWEEP_SECONDS"));
        }

        let rate_limit = RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_seconds),
            max_clients,
        };

        let trusted_proxy_hops = parse_or(&lookup, "TRUSTED_PROXY_HOPS", 0usize)?;

        let ownership_match = match lookup("OWNERSHIP_MATCH") {
            None => MatchPolicy::Either,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "either" | "or" => MatchPolicy::Either,
                "both" | "and" => MatchPolicy::Both,
                _ => return Err(ConfigError::Invalid("OWNERSHIP_MATCH")),
            },
        };

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            body_limit_bytes,
            request_timeout: Duration::from_secs(request_timeout_seconds),
            database_url,
            jwt_secret,
            jwt_leeway_seconds,
            rate_limit,
            rate_limit_sweep_interval: Duration::from_secs(sweep_seconds),
            trusted_proxy_hops,
            ownership_match,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
    }
}
