use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::AccountStore;
use crate::errors::Result;
use crate::models::Account;

/// Accounts table reader.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, Account>(
            r#"SELECT id, created_at, expired_at, username, password, otp_key, u_id
               FROM accounts
               WHERE username = $1 AND expired_at > NOW()"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
