pub mod otp;
pub mod password;

use std::sync::Arc;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::errors::{AuthError, Result};
use crate::models::Account;

/// Read access to registered accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// `Ok(None)` when no live account has this username.
    async fn account_by_username(&self, username: &str) -> Result<Option<Account>>;
}

/// Gates token issuance on username + password + TOTP.
pub struct Authenticator {
    accounts: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
    dummy_hash: &'static str,
}

impl Authenticator {
    /// Computes the dummy hash up front; fails if it cannot be produced.
    pub fn new(accounts: Arc<dyn AccountStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            accounts,
            clock,
            dummy_hash: password::dummy_hash()?,
        })
    }

    /// Verify credentials and return the matching account.
    ///
    /// An unknown username and a wrong password both yield
    /// [`AuthError::UsernameOrPasswordIncorrect`], and both pay for a full
    /// hash comparison. OTP failures are returned as-is.
    pub async fn verify_username_password_otp(
        &self,
        username: &str,
        password: &str,
        otp: &str,
    ) -> Result<Account> {
        let (account, password) = match self.accounts.account_by_username(username).await {
            Ok(Some(account)) => (Some(account), password),
            Ok(None) => {
                tracing::debug!(username = %username, "login for unknown username");
                (None, "")
            }
            Err(e) => {
                tracing::warn!(username = %username, error = %e, "account lookup failed");
                (None, "")
            }
        };

        // Always compare the password hash, even without an account.
        let hash = account
            .as_ref()
            .map(|a| a.password_hash.as_str())
            .unwrap_or(self.dummy_hash);
        let matched = password::verify_password(password, hash);

        let account = match account {
            Some(account) if matched => account,
            Some(account) => {
                tracing::debug!(user_id = account.user_id, "password mismatch");
                return Err(AuthError::UsernameOrPasswordIncorrect);
            }
            None => return Err(AuthError::UsernameOrPasswordIncorrect),
        };

        if account.otp_enabled() {
            otp::verify_otp_at(otp, &account.otp_key, self.clock.now()).map_err(|e| {
                tracing::debug!(user_id = account.user_id, error = %e, "otp rejected");
                e
            })?;
        }

        Ok(account)
    }
}
