//! Runtime configuration, loaded from `CHAINTRACK_*` environment variables.
//!
//! Loading goes through an injectable lookup so tests never touch the process
//! environment. Malformed values are errors; only absent values fall back to
//! defaults.

use std::net::SocketAddr;

use thiserror::Error;

use chaintrack_observability::{LogFormat, LogSettings};
use chaintrack_shipments::StatusUpdatePolicy;

pub const BIND_ADDR_VAR: &str = "CHAINTRACK_BIND_ADDR";
pub const JWT_SECRET_VAR: &str = "CHAINTRACK_JWT_SECRET";
pub const STATUS_POLICY_VAR: &str = "CHAINTRACK_STATUS_POLICY";
pub const LOW_STOCK_THRESHOLD_VAR: &str = "CHAINTRACK_LOW_STOCK_THRESHOLD";
pub const LOG_FORMAT_VAR: &str = "CHAINTRACK_LOG_FORMAT";
pub const LOG_LEVEL_VAR: &str = "CHAINTRACK_LOG_LEVEL";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_LOW_STOCK_THRESHOLD: u64 = 10;
const DEV_JWT_SECRET: &str = "chaintrack-dev-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub status_policy: StatusUpdatePolicy,
    pub low_stock_threshold: u64,
    pub log: LogSettings,
}

impl ChainConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to resolve variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_addr = match get(BIND_ADDR_VAR) {
            Some(v) => v
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::invalid(BIND_ADDR_VAR, &v, e))?,
            None => default_bind_addr(),
        };

        let jwt_secret = get(JWT_SECRET_VAR).unwrap_or_else(|| DEV_JWT_SECRET.to_string());

        let status_policy = match get(STATUS_POLICY_VAR) {
            Some(v) => v
                .parse::<StatusUpdatePolicy>()
                .map_err(|e| ConfigError::invalid(STATUS_POLICY_VAR, &v, e))?,
            None => StatusUpdatePolicy::default(),
        };

        let low_stock_threshold = match get(LOW_STOCK_THRESHOLD_VAR) {
            Some(v) => v
                .parse::<u64>()
                .map_err(|e| ConfigError::invalid(LOW_STOCK_THRESHOLD_VAR, &v, e))?,
            None => DEFAULT_LOW_STOCK_THRESHOLD,
        };

        let format = match get(LOG_FORMAT_VAR) {
            Some(v) => v
                .parse::<LogFormat>()
                .map_err(|e| ConfigError::invalid(LOG_FORMAT_VAR, &v, e))?,
            None => LogFormat::default(),
        };

        let default_level = get(LOG_LEVEL_VAR).unwrap_or_else(|| "info".to_string());
        let log = LogSettings {
            format,
            default_level,
        };
        log.validate()
            .map_err(|e| ConfigError::invalid(LOG_LEVEL_VAR, &log.default_level, e.reason))?;

        Ok(Self {
            bind_addr,
            jwt_secret,
            status_policy,
            low_stock_threshold,
            log,
        })
    }

    /// True when no JWT secret was configured and the insecure dev secret is in use.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            status_policy: StatusUpdatePolicy::default(),
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            log: LogSettings::default(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
