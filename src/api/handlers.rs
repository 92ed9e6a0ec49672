use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::errors::AuthError;
use crate::models::{Access, Account, Token};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub otp: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub account: Account,
    pub token: TokenResponse,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub id: Uuid,
    pub token: String,
    pub access: Access,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl From<Token> for TokenResponse {
    fn from(token: Token) -> Self {
        Self {
            id: token.uuid,
            token: token.jwt,
            access: token.access,
            user_id: token.user_id,
            created_at: token.created_at,
            expired_at: token.expired_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(default = "any_access")]
    pub access: Access,
}

fn any_access() -> Access {
    Access::Any
}

fn bearer(headers: &HeaderMap) -> Result<String, AuthError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::ParsingToken("missing bearer token".into()))
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let (account, token) = state
        .dispatch
        .login(req.username, req.password, req.otp)
        .await?;
    Ok(Json(LoginResponse {
        account,
        token: token.into(),
    }))
}

/// POST /tokens/verify?access=<scope>
pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AuthError> {
    let jwt = bearer(&headers)?;
    let token = state.dispatch.verify_token(jwt, query.access).await?;
    Ok(Json(token.into()))
}

/// DELETE /tokens: revokes the presented token.
pub async fn deactivate_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, AuthError> {
    let jwt = bearer(&headers)?;
    let token = state.dispatch.verify_token(jwt, Access::Any).await?;
    state.dispatch.deactivate_token(token).await?;
    Ok(StatusCode::NO_CONTENT)
}
