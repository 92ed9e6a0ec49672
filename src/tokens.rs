use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::errors::{AuthError, Result};
use crate::models::{Access, Token};

pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Where issued tokens live. Implemented by [`crate::cache::TokenCache`].
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_token(&self, token: &Token) -> Result<()>;
    async fn delete_token(&self, uuid: Uuid) -> Result<()>;
    async fn token(&self, uuid: Uuid) -> Result<Token>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    jti: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues, verifies and deactivates HS256-signed bearer tokens.
pub struct TokenService {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: chrono::Duration,
}

impl TokenService {
    /// Fails instead of panicking when the signer cannot be set up, so a bad
    /// secret stops the process at start-up.
    pub fn new(
        store: Arc<dyn TokenStore>,
        secret: &[u8],
        clock: Arc<dyn Clock>,
        lifetime: Duration,
    ) -> Result<Self> {
        if secret.is_empty() {
            return Err(AuthError::SignerInit("signing secret is empty".into()));
        }
        let lifetime = chrono::Duration::from_std(lifetime)
            .map_err(|e| AuthError::SignerInit(format!("invalid token lifetime: {}", e)))?;

        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is checked against the injected clock instead
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            store,
            clock,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime,
        })
    }

    pub async fn generate_token(&self, user_id: i64, access: Access) -> Result<Token> {
        let now = whole_seconds(self.clock.now());
        let uuid = Uuid::new_v4();
        let created_at = now;
        let expired_at = now + self.lifetime;

        let claims = Claims {
            jti: uuid.to_string(),
            sub: user_id.to_string(),
            iat: created_at.timestamp(),
            exp: expired_at.timestamp(),
        };
        let jwt = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AuthError::GeneratingToken)?;

        let token = Token {
            id: 0,
            uuid,
            created_at,
            expired_at,
            access,
            jwt,
            user_id,
        };
        self.store.insert_token(&token).await?;

        tracing::info!(token_id = %uuid, user_id, access = %access, "issued token");
        Ok(token)
    }

    /// Resolve a signed token to its stored record and check that it grants
    /// `access`.
    pub async fn verify_token(&self, jwt: &str, access: Access) -> Result<Token> {
        let claims = decode::<Claims>(jwt, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::ParsingToken(e.to_string()))?
            .claims;

        if claims.exp < self.clock.now().timestamp() {
            return Err(AuthError::ParsingToken("token has expired".into()));
        }

        let uuid = Uuid::parse_str(&claims.jti)
            .map_err(|e| AuthError::ParsingToken(format!("invalid jti: {}", e)))?;

        let token = self.store.token(uuid).await?;
        if token.user_id.to_string() != claims.sub {
            return Err(AuthError::ParsingToken(
                "subject does not match token".into(),
            ));
        }

        if token.access.grants(access) {
            Ok(token)
        } else {
            tracing::debug!(
                token_id = %uuid,
                held = %token.access,
                requested = %access,
                "access denied"
            );
            Err(AuthError::AccessUnauthorized)
        }
    }

    /// Expire `token` and remove it from storage. The new expiry is only
    /// recorded on the caller's copy; the stored record is deleted.
    pub async fn deactivate_token(&self, token: &mut Token) -> Result<()> {
        token.expired_at = self.clock.now();
        self.store.delete_token(token.uuid).await?;
        tracing::info!(token_id = %token.uuid, user_id = token.user_id, "deactivated token");
        Ok(())
    }
}

fn whole_seconds(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, TokenCache};
    use crate::clock::ManualClock;
    use crate::store::memory::InMemoryStore;

    const SECRET: &[u8] = b"test-signing-secret";

    fn setup() -> (TokenService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let durable = Arc::new(InMemoryStore::with_clock(clock.clone()));
        let cache = Arc::new(TokenCache::new(
            durable,
            clock.clone(),
            CacheConfig::default(),
        ));
        let service =
            TokenService::new(cache, SECRET, clock.clone(), DEFAULT_TOKEN_LIFETIME).unwrap();
        (service, clock)
    }

    #[tokio::test]
    async fn test_generated_token_shape() {
        let (service, clock) = setup();
        let token = service.generate_token(7, Access::All).await.unwrap();

        assert_eq!(token.user_id, 7);
        assert_eq!(token.created_at, clock.now());
        assert_eq!(token.expired_at - token.created_at, chrono::Duration::days(7));

        let key = DecodingKey::from_secret(SECRET);
        let claims = decode::<Claims>(&token.jwt, &key, &service.validation)
            .unwrap()
            .claims;
        assert_eq!(claims.jti, token.uuid.to_string());
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.iat, token.created_at.timestamp());
        assert_eq!(claims.exp, token.expired_at.timestamp());
    }

    #[tokio::test]
    async fn test_access_matrix() {
        let (service, _) = setup();
        let cases = [
            (Access::Reset, Access::Any, true),
            (Access::All, Access::Reset, true),
            (Access::Reset, Access::Reset, true),
            (Access::Reset, Access::Activate, false),
            (Access::Activate, Access::Reset, false),
        ];
        for (stored, requested, allowed) in cases {
            let token = service.generate_token(1, stored).await.unwrap();
            let result = service.verify_token(&token.jwt, requested).await;
            if allowed {
                assert_eq!(result.unwrap(), token);
            } else {
                assert!(
                    matches!(result, Err(AuthError::AccessUnauthorized)),
                    "stored={stored} requested={requested}"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_deactivate_then_verify_is_not_found() {
        let (service, clock) = setup();
        let mut token = service.generate_token(7, Access::All).await.unwrap();

        clock.advance(chrono::Duration::seconds(5));
        service.deactivate_token(&mut token).await.unwrap();
        assert_eq!(token.expired_at, clock.now());

        let err = service.verify_token(&token.jwt, Access::Any).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound));
    }

    #[tokio::test]
    async fn test_garbage_and_foreign_signatures() {
        let (service, _) = setup();
        let err = service.verify_token("not-a-jwt", Access::Any).await.unwrap_err();
        assert!(matches!(err, AuthError::ParsingToken(_)));

        let claims = Claims {
            jti: Uuid::new_v4().to_string(),
            sub: "7".into(),
            iat: 1_700_000_000,
            exp: 1_700_600_000,
        };
        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"another-secret"),
        )
        .unwrap();
        let err = service.verify_token(&forged, Access::Any).await.unwrap_err();
        assert!(matches!(err, AuthError::ParsingToken(_)));
    }

    #[tokio::test]
    async fn test_non_uuid_jti() {
        let (service, _) = setup();
        let claims = Claims {
            jti: "not-a-uuid".into(),
            sub: "7".into(),
            iat: 1_700_000_000,
            exp: 1_700_600_000,
        };
        let jwt = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        let err = service.verify_token(&jwt, Access::Any).await.unwrap_err();
        assert!(matches!(err, AuthError::ParsingToken(_)));
    }

    #[tokio::test]
    async fn test_expired_signature_rejected() {
        let (service, clock) = setup();
        let token = service.generate_token(7, Access::All).await.unwrap();
        clock.advance(chrono::Duration::days(7) + chrono::Duration::seconds(1));

        let err = service.verify_token(&token.jwt, Access::Any).await.unwrap_err();
        assert!(matches!(err, AuthError::ParsingToken(_)));
    }

    #[tokio::test]
    async fn test_subject_must_match_stored_token() {
        let (service, _) = setup();
        let token = service.generate_token(7, Access::All).await.unwrap();
        let claims = Claims {
            jti: token.uuid.to_string(),
            sub: "8".into(),
            iat: token.created_at.timestamp(),
            exp: token.expired_at.timestamp(),
        };
        let jwt = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let err = service.verify_token(&jwt, Access::Any).await.unwrap_err();
        assert!(matches!(err, AuthError::ParsingToken(_)));
    }

    #[test]
    fn test_empty_secret_is_an_init_error() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = Arc::new(TokenCache::new(
            Arc::new(InMemoryStore::new()),
            clock.clone(),
            CacheConfig::default(),
        ));
        let err = TokenService::new(cache, b"", clock, DEFAULT_TOKEN_LIFETIME)
            .err()
            .unwrap();
        assert!(matches!(err, AuthError::SignerInit(_)));
    }
}
