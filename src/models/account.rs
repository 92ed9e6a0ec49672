use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered principal. Read-only to this crate; accounts are created and
/// expired elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Account {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
    pub username: String,
    #[serde(skip_serializing)]
    #[sqlx(rename = "password")]
    pub password_hash: String,
    /// Base32 TOTP secret. Empty means the second factor is disabled.
    #[serde(skip_serializing)]
    pub otp_key: String,
    #[sqlx(rename = "u_id")]
    pub user_id: i64,
}

impl Account {
    pub fn otp_enabled(&self) -> bool {
        !self.otp_key.is_empty()
    }
}
