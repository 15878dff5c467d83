use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::services::DEFAULT_HOLD_TTL_MINUTES;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::with_security_headers;

pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
/// One day.
const MAX_HOLD_TTL_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs the server on the in-process store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub hold_ttl_minutes: i64,
    /// Zero disables the background sweep.
    pub sweep_interval_secs: u64,
    pub cors_allowed_origins: String,
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let hold_ttl_minutes = parse_or(&lookup, "HOLD_TTL_MINUTES", DEFAULT_HOLD_TTL_MINUTES);
        let hold_ttl_minutes = if (1..=MAX_HOLD_TTL_MINUTES).contains(&hold_ttl_minutes) {
            hold_ttl_minutes
        } else {
            tracing::warn!(
                "Config: HOLD_TTL_MINUTES must be between 1 and {}, using {}",
                MAX_HOLD_TTL_MINUTES,
                DEFAULT_HOLD_TTL_MINUTES
            );
            DEFAULT_HOLD_TTL_MINUTES
        };

        let default_addr = SocketAddr::from(([0, 0, 0, 0], 3001));

        Self {
            database_url,
            database_max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            ),
            bind_addr: parse_or(&lookup, "BIND_ADDR", default_addr),
            hold_ttl_minutes,
            sweep_interval_secs: parse_or(
                &lookup,
                "SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL_SECS,
            ),
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string()),
            production: lookup("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
        }
    }

    pub fn hold_ttl(&self) -> Duration {
        Duration::minutes(self.hold_ttl_minutes)
    }

    pub fn sweep_interval(&self) -> Option<StdDuration> {
        (self.sweep_interval_secs > 0).then(|| StdDuration::from_secs(self.sweep_interval_secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Config: Invalid {} '{}', using {}", key, raw, default);
                default
            }
        },
    }
}
