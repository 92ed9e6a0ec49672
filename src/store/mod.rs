pub mod memory;
pub mod postgres;
pub mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::Result;

/// Durable key/value tier behind the token cache.
///
/// Keys are canonical UUID strings, values are codec-encoded tokens.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Write `value` under `key`, retained for at least `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// `Ok(None)` when the key does not exist (or has expired).
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn delete(&self, key: &str) -> Result<()>;
}
