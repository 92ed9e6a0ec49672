/// Password hashing and verification using Argon2id
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use once_cell::sync::Lazy;

use crate::errors::{AuthError, Result};

/// Hash used when there is no account to compare against, so a failed
/// lookup costs the same as a wrong password. The plaintext is random and
/// never the empty string.
static DUMMY_HASH: Lazy<std::result::Result<String, String>> = Lazy::new(|| {
    let filler = super::otp::generate_secret();
    hash_password(&filler).map_err(|e| e.to_string())
});

/// The dummy hash, computed on first call. Callers force it at start-up so
/// no login pays for it.
pub(crate) fn dummy_hash() -> Result<&'static str> {
    DUMMY_HASH
        .as_deref()
        .map_err(|e| AuthError::HashingPassword(e.clone()))
}

/// Hash a password into a PHC string suitable for the accounts table.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::HashingPassword(e.to_string()))?;
    Ok(hash.to_string())
}

/// Constant-time comparison of `password` against a stored PHC hash.
/// A malformed stored hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
