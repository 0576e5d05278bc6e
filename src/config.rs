use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::admissions::RejectionMode;
use crate::db::DbConfig;

pub type Lookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

pub(crate) fn parse_or<T: FromStr>(lookup: &Lookup<'_>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Postgres,
    Memory,
}

impl FromStr for BackendKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(BackendKind::Postgres),
            "memory" | "in-memory" => Ok(BackendKind::Memory),
            _ => Err(()),
        }
    }
}

/// Selected store together with the settings it needs.
#[derive(Clone, Debug)]
pub enum BackendConfig {
    Postgres(DbConfig),
    /// Sample data with demo credentials; only when `ERP_BACKEND=memory`.
    Memory,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub rejection_mode: RejectionMode,
    pub backend: BackendConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup(lookup: &Lookup<'_>) -> Result<Self, ConfigError> {
        let bind_addr = parse_or(lookup, "BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?;
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let jwt_ttl = Duration::from_secs(parse_or(lookup, "JWT_TTL_SECS", 8 * 60 * 60)?);
        let rejection_mode = match lookup("ERP_REJECTION_MODE") {
            None => RejectionMode::default(),
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "ERP_REJECTION_MODE",
                value,
            })?,
        };
        let backend = match parse_or(lookup, "ERP_BACKEND", BackendKind::Postgres)? {
            BackendKind::Postgres => BackendConfig::Postgres(DbConfig::from_lookup(lookup)?),
            BackendKind::Memory => BackendConfig::Memory,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_ttl,
            rejection_mode,
            backend,
        })
    }
}
