//! Receiver configuration
//!
//! All settings come from `INSTALLGATE_*` environment variables. Unset
//! variables take their defaults; set-but-invalid variables are errors
//! rather than silently falling back.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

use installgate_core::VerificationOptions;
use installgate_platform::{PlatformClientConfig, RetryPolicy};

/// Default listen port
pub const DEFAULT_PORT: u16 = 8082;

/// Default clock-skew allowance for inbound credentials; expiry is exact unless raised
pub const DEFAULT_LEEWAY_SECS: u64 = 0;

/// Default outbound request timeout
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Default platform API path probed by the work-hour validation hook
pub const DEFAULT_MANHOUR_PROBE_PATH: &str = "/project/issues";

/// Default verdict reason returned by the work-hour validation hook
pub const DEFAULT_MANHOUR_REJECT_REASON: &str = "不准提交工时！";

/// Configuration error
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not valid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Work-hour validation hook settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManhourSettings {
    /// Platform API path called as the requesting user
    pub probe_path: String,

    /// Reason placed in the rejection verdict
    pub reject_reason: String,
}

impl Default for ManhourSettings {
    fn default() -> Self {
        Self {
            probe_path: DEFAULT_MANHOUR_PROBE_PATH.to_string(),
            reject_reason: DEFAULT_MANHOUR_REJECT_REASON.to_string(),
        }
    }
}

/// Full receiver configuration
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// `INSTALLGATE_PORT`
    pub port: u16,

    /// `INSTALLGATE_DATABASE_URL`; `None` selects the in-memory store
    pub database_url: Option<String>,

    /// `INSTALLGATE_AUDIENCE` and `INSTALLGATE_LEEWAY_SECS`
    pub verification: VerificationOptions,

    /// `INSTALLGATE_HTTP_TIMEOUT_SECS`, `INSTALLGATE_RETRY_ATTEMPTS`
    /// and `INSTALLGATE_TOKEN_CACHE_SECS`
    pub platform: PlatformClientConfig,

    /// `INSTALLGATE_MANHOUR_PROBE_PATH` and `INSTALLGATE_MANHOUR_REJECT_REASON`
    pub manhour: ManhourSettings,

    /// `INSTALLGATE_LOG_LEVEL`
    pub log_level: Level,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            verification: VerificationOptions::default(),
            platform: PlatformClientConfig::default(),
            manhour: ManhourSettings::default(),
            log_level: Level::INFO,
        }
    }
}

impl ReceiverConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env::vars().collect())
    }

    /// Build configuration from an explicit variable map
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let lookup = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        let port = parse_or(lookup("INSTALLGATE_PORT"), "INSTALLGATE_PORT", DEFAULT_PORT)?;

        let database_url = lookup("INSTALLGATE_DATABASE_URL").map(str::to_string);
        if let Some(url) = &database_url {
            if !url.starts_with("sqlite:") {
                return Err(ConfigError::Invalid {
                    var: "INSTALLGATE_DATABASE_URL",
                    reason: format!("unsupported database url '{}', expected sqlite://", url),
                });
            }
        }

        let verification = VerificationOptions {
            leeway_secs: parse_or(
                lookup("INSTALLGATE_LEEWAY_SECS"),
                "INSTALLGATE_LEEWAY_SECS",
                DEFAULT_LEEWAY_SECS,
            )?,
            audience: lookup("INSTALLGATE_AUDIENCE").map(str::to_string),
        };

        let timeout_secs: u64 = parse_or(
            lookup("INSTALLGATE_HTTP_TIMEOUT_SECS"),
            "INSTALLGATE_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "INSTALLGATE_HTTP_TIMEOUT_SECS",
                reason: "must be at least 1".into(),
            });
        }

        let attempts: u32 = parse_or(lookup("INSTALLGATE_RETRY_ATTEMPTS"), "INSTALLGATE_RETRY_ATTEMPTS", 1)?;
        if attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "INSTALLGATE_RETRY_ATTEMPTS",
                reason: "must be at least 1".into(),
            });
        }

        let mut platform = PlatformClientConfig::default()
            .with_timeout(Duration::from_secs(timeout_secs))
            .with_retry(RetryPolicy::with_attempts(attempts));

        if let Some(raw) = lookup("INSTALLGATE_TOKEN_CACHE_SECS") {
            let ttl: u64 = parse_or(Some(raw), "INSTALLGATE_TOKEN_CACHE_SECS", 0)?;
            if ttl > 0 {
                platform = platform.with_token_cache(Duration::from_secs(ttl));
            }
        }

        let mut manhour = ManhourSettings::default();
        if let Some(path) = lookup("INSTALLGATE_MANHOUR_PROBE_PATH") {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    var: "INSTALLGATE_MANHOUR_PROBE_PATH",
                    reason: "must start with '/'".into(),
                });
            }
            manhour.probe_path = path.to_string();
        }
        if let Some(reason) = lookup("INSTALLGATE_MANHOUR_REJECT_REASON") {
            manhour.reject_reason = reason.to_string();
        }

        let log_level = parse_or(lookup("INSTALLGATE_LOG_LEVEL"), "INSTALLGATE_LOG_LEVEL", Level::INFO)?;

        Ok(Self {
            port,
            database_url,
            verification,
            platform,
            manhour,
            log_level,
        })
    }
}

fn parse_or<T>(raw: Option<&str>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: format!("'{}': {}", value, e),
        }),
    }
}
