//! Process-local stores for development and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::DurableStore;
use crate::auth::AccountStore;
use crate::clock::{Clock, SystemClock};
use crate::errors::Result;
use crate::models::Account;

struct Entry {
    value: Vec<u8>,
    expires_at: chrono::DateTime<chrono::Utc>,
}

/// Map-backed [`DurableStore`] and [`AccountStore`]. Expiry follows the
/// injected clock so retention can be exercised without waiting.
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    accounts: RwLock<HashMap<String, Account>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            accounts: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub async fn add_account(&self, account: Account) {
        self.accounts
            .write()
            .await
            .insert(account.username.clone(), account);
    }

    /// Number of live durable entries.
    pub async fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(ttl)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let now = self.clock.now();
        let accounts = self.accounts.read().await;
        // an unset (epoch) expiry means the account never expires
        Ok(accounts
            .get(username)
            .filter(|a| a.expired_at.timestamp() == 0 || a.expired_at > now)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{DateTime, Duration as ChronoDuration};

    #[tokio::test]
    async fn test_durable_retention_follows_clock() {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let store = InMemoryStore::with_clock(clock.clone());

        store
            .set("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));

        clock.advance(ChronoDuration::seconds(61));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_accounts_hidden() {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let store = InMemoryStore::with_clock(clock.clone());
        store
            .add_account(Account {
                username: "bob".into(),
                expired_at: DateTime::from_timestamp(1_700_000_100, 0).unwrap(),
                ..Default::default()
            })
            .await;

        assert!(store.account_by_username("bob").await.unwrap().is_some());
        clock.advance(ChronoDuration::seconds(200));
        assert!(store.account_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unset_expiry_never_expires() {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let store = InMemoryStore::with_clock(clock.clone());
        store
            .add_account(Account {
                username: "dana".into(),
                ..Default::default()
            })
            .await;

        clock.advance(ChronoDuration::days(10_000));
        let account = store.account_by_username("dana").await.unwrap();
        assert_eq!(account.map(|a| a.username), Some("dana".to_string()));
        assert!(store.account_by_username("erin").await.unwrap().is_none());
    }
}
