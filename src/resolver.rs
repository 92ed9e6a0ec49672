use crate::auth::Authenticator;
use crate::errors::Result;
use crate::models::{Access, Account, Token};
use crate::tokens::TokenService;

/// Entry point for the transport layer: login, verification and
/// deactivation. Errors from the components are returned unchanged.
pub struct Resolver {
    authenticator: Authenticator,
    tokens: TokenService,
}

impl Resolver {
    pub fn new(authenticator: Authenticator, tokens: TokenService) -> Self {
        Self {
            authenticator,
            tokens,
        }
    }

    /// Authenticate and issue a full-access token bound to the account's
    /// user id.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        otp: &str,
    ) -> Result<(Account, Token)> {
        let account = self
            .authenticator
            .verify_username_password_otp(username, password, otp)
            .await?;
        let token = self.tokens.generate_token(account.user_id, Access::All).await?;
        Ok((account, token))
    }

    pub async fn verify_token(&self, jwt: &str, access: Access) -> Result<Token> {
        self.tokens.verify_token(jwt, access).await
    }

    pub async fn deactivate_token(&self, token: &mut Token) -> Result<()> {
        self.tokens.deactivate_token(token).await
    }
}
