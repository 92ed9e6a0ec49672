use std::time::Duration;

use crate::cache::{CacheConfig, DEFAULT_DURABLE_TTL, DEFAULT_MEMORY_TTL};
use crate::dispatch::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use crate::tokens::DEFAULT_TOKEN_LIFETIME;

const PLACEHOLDER_SECRET: &str = "CHANGE_ME_TOKEN_SECRET";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    /// HMAC key for signing tokens.
    pub token_secret: String,
    /// Memory-tier freshness window. Set via AUTHER_MEMORY_TTL_SECS. Default: 3600.
    pub memory_ttl: Duration,
    /// Durable-tier retention hint. Set via AUTHER_DURABLE_TTL_SECS. Default: 604800.
    pub durable_ttl: Duration,
    /// Offset from issuance to token expiry. Set via AUTHER_TOKEN_LIFETIME_SECS.
    pub token_lifetime: Duration,
    pub dispatch_workers: usize,
    pub dispatch_queue: usize,
    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,
}

impl Config {
    pub fn cache(&self) -> CacheConfig {
        CacheConfig {
            memory_ttl: self.memory_ttl,
            durable_ttl: self.durable_ttl,
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

/// Build a config from an arbitrary key lookup. Unparseable numbers fall
/// back to their defaults.
pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let token_secret = lookup("AUTHER_TOKEN_SECRET").unwrap_or_else(|| PLACEHOLDER_SECRET.into());

    if token_secret == PLACEHOLDER_SECRET {
        let env_mode = lookup("AUTHER_ENV")
            .or_else(|| lookup("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "AUTHER_TOKEN_SECRET is still the insecure placeholder. \
                 Set a long random secret before running in production."
            );
        }
        eprintln!(
            "⚠️  AUTHER_TOKEN_SECRET is not set, using insecure placeholder. \
             Set a long random secret for production."
        );
    }

    let number = |key: &str| lookup(key).and_then(|v| v.parse::<u64>().ok());
    let secs = |key: &str, default: Duration| {
        number(key).map(Duration::from_secs).unwrap_or(default)
    };

    Ok(Config {
        port: lookup("AUTHER_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080),
        database_url: lookup("DATABASE_URL")
            .unwrap_or_else(|| "postgres://localhost/auther".into()),
        redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".into()),
        token_secret,
        memory_ttl: secs("AUTHER_MEMORY_TTL_SECS", DEFAULT_MEMORY_TTL),
        durable_ttl: secs("AUTHER_DURABLE_TTL_SECS", DEFAULT_DURABLE_TTL),
        token_lifetime: secs("AUTHER_TOKEN_LIFETIME_SECS", DEFAULT_TOKEN_LIFETIME),
        dispatch_workers: number("AUTHER_DISPATCH_WORKERS")
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_WORKERS),
        dispatch_queue: number("AUTHER_DISPATCH_QUEUE")
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_QUEUE_CAPACITY),
        json_logs: lookup("AUTHER_LOG_FORMAT").as_deref() == Some("json"),
    })
}
