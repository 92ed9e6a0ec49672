//! Job queue in front of the [`Resolver`].
//!
//! A bounded queue is drained by a fixed pool of workers. Each job carries a
//! oneshot channel for its reply. Workers exit once every [`DispatchHandle`]
//! has been dropped and the queue is empty.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::errors::{AuthError, Result};
use crate::models::{Access, Account, Token};
use crate::resolver::Resolver;

pub const DEFAULT_WORKERS: usize = 256;
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

type Reply<T> = oneshot::Sender<Result<T>>;

pub enum Job {
    Login {
        username: String,
        password: String,
        otp: String,
        reply: Reply<(Account, Token)>,
    },
    VerifyToken {
        jwt: String,
        access: Access,
        reply: Reply<Token>,
    },
    DeactivateToken {
        token: Token,
        reply: Reply<Token>,
    },
}

/// Submits jobs and awaits their replies. Cheap to clone.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<Job>,
}

/// The running worker pool. Dropping it detaches the workers; they keep
/// serving until the last [`DispatchHandle`] is gone.
pub struct Dispatcher {
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn(
        resolver: Arc<Resolver>,
        workers: usize,
        capacity: usize,
    ) -> (DispatchHandle, Dispatcher) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers: Vec<_> = (0..workers.max(1))
            .map(|id| tokio::spawn(run_worker(id, resolver.clone(), rx.clone())))
            .collect();
        tracing::debug!(workers = workers.len(), capacity, "dispatcher started");

        (DispatchHandle { tx }, Dispatcher { workers })
    }

    /// Wait for every worker to finish. Only returns after all handles are
    /// dropped.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!("dispatch worker failed: {}", e);
            }
        }
    }
}

async fn run_worker(id: usize, resolver: Arc<Resolver>, rx: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = rx.lock().await.recv().await;
        match job {
            Some(job) => handle(&resolver, job).await,
            None => break,
        }
    }
    tracing::debug!(worker = id, "dispatch worker stopped");
}

async fn handle(resolver: &Resolver, job: Job) {
    let delivered = match job {
        Job::Login {
            username,
            password,
            otp,
            reply,
        } => reply
            .send(resolver.login(&username, &password, &otp).await)
            .is_ok(),
        Job::VerifyToken { jwt, access, reply } => reply
            .send(resolver.verify_token(&jwt, access).await)
            .is_ok(),
        Job::DeactivateToken { mut token, reply } => {
            let result = resolver.deactivate_token(&mut token).await.map(|_| token);
            reply.send(result).is_ok()
        }
    };
    if !delivered {
        tracing::debug!("job reply dropped by caller");
    }
}

impl DispatchHandle {
    async fn submit<T>(&self, job: Job, rx: oneshot::Receiver<Result<T>>) -> Result<T> {
        self.tx
            .send(job)
            .await
            .map_err(|_| AuthError::DispatchClosed)?;
        rx.await.map_err(|_| AuthError::DispatchClosed)?
    }

    pub async fn login(
        &self,
        username: String,
        password: String,
        otp: String,
    ) -> Result<(Account, Token)> {
        let (reply, rx) = oneshot::channel();
        let job = Job::Login {
            username,
            password,
            otp,
            reply,
        };
        self.submit(job, rx).await
    }

    pub async fn verify_token(&self, jwt: String, access: Access) -> Result<Token> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::VerifyToken { jwt, access, reply }, rx).await
    }

    /// Returns the token with its expiry set to the deactivation time.
    pub async fn deactivate_token(&self, token: Token) -> Result<Token> {
        let (reply, rx) = oneshot::channel();
        self.submit(Job::DeactivateToken { token, reply }, rx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use crate::auth::Authenticator;
    use crate::cache::{CacheConfig, TokenCache};
    use crate::clock::SystemClock;
    use crate::store::memory::InMemoryStore;
    use crate::tokens::{TokenService, DEFAULT_TOKEN_LIFETIME};
    use tokio::task::JoinSet;

    async fn resolver() -> Arc<Resolver> {
        let store = Arc::new(InMemoryStore::new());
        store
            .add_account(Account {
                username: "dave".into(),
                password_hash: hash_password("pw").unwrap(),
                user_id: 11,
                ..Default::default()
            })
            .await;
        let clock = Arc::new(SystemClock);
        let cache = Arc::new(TokenCache::new(
            store.clone(),
            clock.clone(),
            CacheConfig::default(),
        ));
        let tokens =
            TokenService::new(cache, b"dispatch-secret", clock.clone(), DEFAULT_TOKEN_LIFETIME)
                .unwrap();
        let authenticator = Authenticator::new(store, clock).unwrap();
        Arc::new(Resolver::new(authenticator, tokens))
    }

    #[tokio::test]
    async fn test_jobs_round_trip_through_workers() {
        let (handle, dispatcher) = Dispatcher::spawn(resolver().await, 4, 8);

        let (account, token) = handle
            .login("dave".into(), "pw".into(), String::new())
            .await
            .unwrap();
        assert_eq!(account.user_id, 11);

        let verified = handle
            .verify_token(token.jwt.clone(), Access::Activate)
            .await
            .unwrap();
        assert_eq!(verified.uuid, token.uuid);

        let deactivated = handle.deactivate_token(verified).await.unwrap();
        assert!(deactivated.expired_at <= chrono::Utc::now());

        let err = handle
            .verify_token(token.jwt, Access::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound));

        drop(handle);
        dispatcher.join().await;
    }

    #[tokio::test]
    async fn test_errors_are_forwarded_unchanged() {
        let (handle, _dispatcher) = Dispatcher::spawn(resolver().await, 1, 1);
        let err = handle
            .login("dave".into(), "nope".into(), String::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UsernameOrPasswordIncorrect));
    }

    #[tokio::test]
    async fn test_concurrent_logins() {
        let (handle, _dispatcher) = Dispatcher::spawn(resolver().await, 3, 2);
        let mut set = JoinSet::new();
        for _ in 0..10 {
            let handle = handle.clone();
            set.spawn(async move {
                handle
                    .login("dave".into(), "pw".into(), String::new())
                    .await
                    .map(|(_, token)| token.uuid)
            });
        }

        let mut seen = std::collections::HashSet::new();
        while let Some(result) = set.join_next().await {
            assert!(seen.insert(result.unwrap().unwrap()));
        }
        assert_eq!(seen.len(), 10);
    }

    #[tokio::test]
    async fn test_workers_outlive_dropped_dispatcher() {
        let handle = {
            let (handle, _dispatcher) = Dispatcher::spawn(resolver().await, 2, 4);
            handle
        };

        let (account, _) = handle
            .login("dave".into(), "pw".into(), String::new())
            .await
            .unwrap();
        assert_eq!(account.user_id, 11);
    }

    #[tokio::test]
    async fn test_join_returns_once_handles_are_dropped() {
        let (handle, dispatcher) = Dispatcher::spawn(resolver().await, 3, 4);
        let other = handle.clone();
        drop(handle);
        other
            .login("dave".into(), "pw".into(), String::new())
            .await
            .unwrap();
        drop(other);
        dispatcher.join().await;
    }
}
