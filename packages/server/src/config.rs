//! Server configuration read from environment variables.

use std::str::FromStr;
use std::time::Duration;

use pib_dashboard_catalog::DEFAULT_REFRESH_INTERVAL;
use pib_dashboard_database::db::DEFAULT_DATABASE_URL;
use pib_dashboard_loader::{DEFAULT_CAPACITY, DEFAULT_FETCH_TIMEOUT, DEFAULT_TTL, LoaderSettings};

/// Runtime settings of the dashboard server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `DATABASE_URL`
    pub database_url: String,
    /// `BIND_ADDR`
    pub bind_addr: String,
    /// `PORT`
    pub port: u16,
    /// `CACHE_TTL_SECS`
    pub cache_ttl: Duration,
    /// `CACHE_CAPACITY`
    pub cache_capacity: usize,
    /// `CATALOG_REFRESH_SECS`
    pub catalog_refresh: Duration,
    /// `FETCH_TIMEOUT_SECS`
    pub fetch_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            cache_ttl: DEFAULT_TTL,
            cache_capacity: DEFAULT_CAPACITY,
            catalog_refresh: DEFAULT_REFRESH_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match lookup(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Invalid {name}={raw:?}, using default {default:?}");
            default
        }),
    }
}

fn seconds_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> Duration {
    Duration::from_secs(parse_or(lookup, name, default.as_secs()))
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Missing or invalid values
    /// fall back to the defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_or(&lookup, "PORT", defaults.port),
            cache_ttl: seconds_or(&lookup, "CACHE_TTL_SECS", defaults.cache_ttl),
            cache_capacity: parse_or(&lookup, "CACHE_CAPACITY", defaults.cache_capacity),
            catalog_refresh: seconds_or(&lookup, "CATALOG_REFRESH_SECS", defaults.catalog_refresh),
            fetch_timeout: seconds_or(&lookup, "FETCH_TIMEOUT_SECS", defaults.fetch_timeout),
        }
    }

    /// Settings for the fact loader.
    #[must_use]
    pub const fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            ttl: self.cache_ttl,
            capacity: self.cache_capacity,
            fetch_timeout: self.fetch_timeout,
        }
    }
}
