use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} missing, it is required")]
    Missing(&'static str),

    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub cache_ttl: Duration,
    pub lookup_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = get("PORT").ok_or(ConfigError::Missing("PORT"))?;
        let port = port.parse::<u16>().map_err(|_| ConfigError::Invalid {
            name: "PORT",
            expected: "a valid u16 number",
            value: port,
        })?;

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let cache_ttl_seconds =
            parse_or("CACHE_TTL_SECONDS", get("CACHE_TTL_SECONDS"), DEFAULT_CACHE_TTL_SECONDS)?;
        let lookup_timeout_ms =
            parse_or("LOOKUP_TIMEOUT_MS", get("LOOKUP_TIMEOUT_MS"), DEFAULT_LOOKUP_TIMEOUT_MS)?;

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            database_url,
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
            lookup_timeout: Duration::from_millis(lookup_timeout_ms),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or(name: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => match value.parse::<u64>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(ConfigError::Invalid {
                name,
                expected: "a positive integer",
                value,
            }),
        },
    }
}
