use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::otp::OtpError;
use crate::codec::CodecError;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Coarse classification of an [`AuthError`], used by the transport layer to
/// pick a client-visible response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    TokenFormat,
    NotFound,
    Dependency,
    Crypto,
    Configuration,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username and wrong password are deliberately the same error.
    #[error("username or password is incorrect")]
    UsernameOrPasswordIncorrect,

    #[error("otp is incorrect")]
    OtpIncorrect,

    #[error("error computing otp: {0}")]
    ComputingOtp(#[source] OtpError),

    #[error("error verifying otp: {0}")]
    VerifyingOtp(#[source] OtpError),

    #[error("error hashing password: {0}")]
    HashingPassword(String),

    #[error("access unauthorized")]
    AccessUnauthorized,

    #[error("error parsing token: {0}")]
    ParsingToken(String),

    #[error("malformed token record: {0}")]
    Codec(#[from] CodecError),

    #[error("token not found")]
    TokenNotFound,

    #[error("error generating token: {0}")]
    GeneratingToken(#[source] jsonwebtoken::errors::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("cannot initialise token signer: {0}")]
    SignerInit(String),

    #[error("dispatcher is not accepting jobs")]
    DispatchClosed,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::UsernameOrPasswordIncorrect | AuthError::OtpIncorrect => {
                ErrorKind::Authentication
            }
            AuthError::AccessUnauthorized => ErrorKind::Authorization,
            AuthError::ParsingToken(_) | AuthError::Codec(_) => ErrorKind::TokenFormat,
            AuthError::TokenNotFound => ErrorKind::NotFound,
            AuthError::Redis(_)
            | AuthError::Database(_)
            | AuthError::Store(_)
            | AuthError::DispatchClosed => ErrorKind::Dependency,
            AuthError::ComputingOtp(_)
            | AuthError::VerifyingOtp(_)
            | AuthError::HashingPassword(_)
            | AuthError::GeneratingToken(_) => ErrorKind::Crypto,
            AuthError::SignerInit(_) => ErrorKind::Configuration,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match self.kind() {
            ErrorKind::Authentication => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                if matches!(self, AuthError::OtpIncorrect) {
                    "otp_incorrect"
                } else {
                    "invalid_credentials"
                },
                self.to_string(),
            ),
            ErrorKind::TokenFormat => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_token",
                "invalid token".to_string(),
            ),
            ErrorKind::NotFound => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "token_not_found",
                "invalid or revoked token".to_string(),
            ),
            ErrorKind::Authorization => (
                StatusCode::FORBIDDEN,
                "permission_error",
                "access_unauthorized",
                "token does not grant the requested access".to_string(),
            ),
            ErrorKind::Dependency | ErrorKind::Crypto | ErrorKind::Configuration => {
                tracing::error!("Internal error: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_stay_distinct() {
        assert_eq!(
            AuthError::UsernameOrPasswordIncorrect.kind(),
            ErrorKind::Authentication
        );
        assert_eq!(AuthError::AccessUnauthorized.kind(), ErrorKind::Authorization);
        assert_eq!(AuthError::TokenNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(
            AuthError::ParsingToken("bad".into()).kind(),
            ErrorKind::TokenFormat
        );
        assert_eq!(AuthError::Store("down".into()).kind(), ErrorKind::Dependency);
        assert_eq!(
            AuthError::SignerInit("empty".into()).kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AuthError::OtpIncorrect, StatusCode::UNAUTHORIZED),
            (AuthError::AccessUnauthorized, StatusCode::FORBIDDEN),
            (AuthError::TokenNotFound, StatusCode::UNAUTHORIZED),
            (
                AuthError::Store("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
