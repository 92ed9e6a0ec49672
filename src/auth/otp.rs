//! Time-based one-time passwords (RFC 6238 over RFC 4226, HMAC-SHA1,
//! 30-second step, 6 digits).
//!
//! Only the current step is accepted. There is no ±1 step window for clock
//! skew between client and server.

use chrono::{DateTime, Utc};
use data_encoding::BASE32;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::errors::{AuthError, Result};

pub const STEP_SECS: i64 = 30;
pub const DIGITS: usize = 6;
const MODULUS: u32 = 1_000_000;

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("otp secret is not valid base32: {0}")]
    InvalidSecret(#[from] data_encoding::DecodeError),

    #[error("invalid hmac key: {0}")]
    InvalidKey(#[from] hmac::digest::InvalidLength),

    #[error("time {0} is before the unix epoch")]
    NegativeTime(i64),
}

/// Code for the 30-second step containing "now".
pub fn compute_otp(secret: &str) -> Result<String> {
    compute_otp_at(secret, Utc::now().timestamp())
}

/// Code for the 30-second step containing `unix_secs`.
pub fn compute_otp_at(secret: &str, unix_secs: i64) -> Result<String> {
    hotp(secret, unix_secs).map_err(AuthError::ComputingOtp)
}

pub fn verify_otp(candidate: &str, secret: &str) -> Result<()> {
    verify_otp_at(candidate, secret, Utc::now())
}

pub fn verify_otp_at(candidate: &str, secret: &str, now: DateTime<Utc>) -> Result<()> {
    let expected = hotp(secret, now.timestamp()).map_err(AuthError::VerifyingOtp)?;
    if bool::from(expected.as_bytes().ct_eq(candidate.as_bytes())) {
        Ok(())
    } else {
        Err(AuthError::OtpIncorrect)
    }
}

fn hotp(secret: &str, unix_secs: i64) -> std::result::Result<String, OtpError> {
    if unix_secs < 0 {
        return Err(OtpError::NegativeTime(unix_secs));
    }
    let counter = (unix_secs / STEP_SECS) as u64;

    let key = Zeroizing::new(BASE32.decode(secret.to_ascii_uppercase().as_bytes())?);
    let mut mac = Hmac::<Sha1>::new_from_slice(&key)?;
    mac.update(&counter.to_be_bytes());
    let hash = mac.finalize().into_bytes();

    // Dynamic truncation: the low nibble of the last byte picks a 4-byte window.
    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let window = [
        hash[offset],
        hash[offset + 1],
        hash[offset + 2],
        hash[offset + 3],
    ];
    let code = (u32::from_be_bytes(window) & 0x7fff_ffff) % MODULUS;

    Ok(format!("{:0width$}", code, width = DIGITS))
}

/// Generate a fresh 160-bit secret, base32 encoded.
pub fn generate_secret() -> String {
    let mut bytes = Zeroizing::new([0u8; 20]);
    rand::thread_rng().fill_bytes(&mut *bytes);
    BASE32.encode(&*bytes)
}

/// `otpauth://` URI for enrolling `secret` in an authenticator app.
pub fn provisioning_uri(issuer: &str, username: &str, secret: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
        urlencoding::encode(issuer),
        urlencoding::encode(username),
        secret,
        urlencoding::encode(issuer),
        DIGITS,
        STEP_SECS
    )
}
