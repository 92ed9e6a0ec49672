//! Auther: bearer token issuance and verification.
//!
//! Username + password (+ TOTP) logins mint HS256-signed tokens that are kept
//! in a two-tier cache (process memory in front of a durable store) and
//! checked against an access scope on every use.

pub mod api;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod models;
pub mod resolver;
pub mod store;
pub mod tokens;

pub use errors::{AuthError, ErrorKind, Result};
