use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::clock::Clock;
use crate::codec;
use crate::errors::{AuthError, Result};
use crate::models::Token;
use crate::store::DurableStore;
use crate::tokens::TokenStore;

pub const DEFAULT_MEMORY_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_DURABLE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The two windows are independent tunables; nothing requires them to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a memory entry is served without consulting the durable tier.
    pub memory_ttl: Duration,
    /// Retention hint passed to the durable tier on insert.
    pub durable_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_ttl: DEFAULT_MEMORY_TTL,
            durable_ttl: DEFAULT_DURABLE_TTL,
        }
    }
}

/// Token plus the time it was last written to the local tier. Keeping both
/// in one entry means a reader never sees one without the other.
#[derive(Clone)]
struct CacheEntry {
    token: Token,
    populated_at: DateTime<Utc>,
}

/// Two-tier token cache: in-process map (tier 1) in front of a durable
/// store (tier 2). The durable tier is canonical.
///
/// Local entries are checked on read and evicted lazily; there is no
/// background sweep. The lock is never held across a durable-store call.
///
/// Writes are not transactional across tiers. An insert whose durable write
/// fails leaves the token in memory and returns the error; a delete whose
/// durable delete fails has already removed the memory entry.
#[derive(Clone)]
pub struct TokenCache {
    local: Arc<RwLock<HashMap<Uuid, CacheEntry>>>,
    durable: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    memory_ttl: chrono::Duration,
    durable_ttl: Duration,
}

impl TokenCache {
    pub fn new(durable: Arc<dyn DurableStore>, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            local: Arc::new(RwLock::new(HashMap::new())),
            durable,
            clock,
            memory_ttl: chrono::Duration::from_std(config.memory_ttl)
                .unwrap_or(chrono::Duration::MAX),
            durable_ttl: config.durable_ttl,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        entry
            .populated_at
            .checked_add_signed(self.memory_ttl)
            .map_or(true, |fresh_until| fresh_until > now)
    }

    pub async fn insert(&self, token: &Token) -> Result<()> {
        self.local.write().await.insert(
            token.uuid,
            CacheEntry {
                token: token.clone(),
                populated_at: self.clock.now(),
            },
        );

        let key = token.uuid.to_string();
        if let Err(e) = self
            .durable
            .set(&key, codec::encode(token), self.durable_ttl)
            .await
        {
            tracing::warn!(token_id = %token.uuid, error = %e, "durable token write failed");
            return Err(e);
        }
        Ok(())
    }

    pub async fn delete(&self, uuid: Uuid) -> Result<()> {
        self.local.write().await.remove(&uuid);

        if let Err(e) = self.durable.delete(&uuid.to_string()).await {
            tracing::warn!(token_id = %uuid, error = %e, "durable token delete failed");
            return Err(e);
        }
        Ok(())
    }

    pub async fn lookup(&self, uuid: Uuid) -> Result<Token> {
        // tier 1: in-memory (with freshness check)
        {
            let now = self.clock.now();
            let local = self.local.read().await;
            if let Some(entry) = local.get(&uuid) {
                if self.is_fresh(entry, now) {
                    tracing::debug!(token_id = %uuid, "token cache hit");
                    return Ok(entry.token.clone());
                }
            }
        }

        // stale or absent; another caller may have refreshed it meanwhile
        {
            let now = self.clock.now();
            let mut local = self.local.write().await;
            let stale = local
                .get(&uuid)
                .map(|entry| !self.is_fresh(entry, now))
                .unwrap_or(false);
            if stale {
                tracing::debug!(token_id = %uuid, "evicting stale token");
                local.remove(&uuid);
            }
        }

        // tier 2: durable
        tracing::debug!(token_id = %uuid, "token cache miss");
        let data = self
            .durable
            .get(&uuid.to_string())
            .await?
            .ok_or(AuthError::TokenNotFound)?;
        let token = codec::decode(&data)?;

        self.local.write().await.insert(
            uuid,
            CacheEntry {
                token: token.clone(),
                populated_at: self.clock.now(),
            },
        );

        Ok(token)
    }

    /// Current number of entries in the local tier (for metrics / debugging).
    pub async fn local_len(&self) -> usize {
        self.local.read().await.len()
    }
}

#[async_trait]
impl TokenStore for TokenCache {
    async fn insert_token(&self, token: &Token) -> Result<()> {
        self.insert(token).await
    }

    async fn delete_token(&self, uuid: Uuid) -> Result<()> {
        self.delete(uuid).await
    }

    async fn token(&self, uuid: Uuid) -> Result<Token> {
        self.lookup(uuid).await
    }
}
