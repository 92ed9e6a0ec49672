//! Fixed binary layout for tokens held in the durable tier.
//!
//! All integers are big-endian; timestamps are Unix seconds:
//!
//! ```text
//! id: i64 | uuid: [u8; 16] | created_at: i64 | expired_at: i64
//! access_len: i64 | access: [u8] | jwt_len: i64 | jwt: [u8] | user_id: i64
//! ```
//!
//! The layout carries no version tag; any change to field order or width is
//! a breaking format change.

use bytes::{Buf, BufMut, BytesMut};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Access, Token};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer underrun reading {field}: need {needed} bytes, {remaining} left")]
    Underrun {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("invalid length {len} for {field}")]
    InvalidLength { field: &'static str, len: i64 },

    #[error("{0} is not valid utf-8")]
    InvalidUtf8(&'static str),

    #[error("unknown access scope '{0}'")]
    UnknownAccess(String),

    #[error("timestamp {0} out of range")]
    InvalidTimestamp(i64),

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
}

pub fn encode(token: &Token) -> Vec<u8> {
    let access = token.access.as_str().as_bytes();
    let jwt = token.jwt.as_bytes();
    let mut buf = BytesMut::with_capacity(8 * 7 + 16 + access.len() + jwt.len());

    buf.put_i64(token.id);
    buf.put_slice(token.uuid.as_bytes());
    buf.put_i64(token.created_at.timestamp());
    buf.put_i64(token.expired_at.timestamp());
    buf.put_i64(access.len() as i64);
    buf.put_slice(access);
    buf.put_i64(jwt.len() as i64);
    buf.put_slice(jwt);
    buf.put_i64(token.user_id);

    buf.to_vec()
}

pub fn decode(mut data: &[u8]) -> Result<Token, CodecError> {
    let buf = &mut data;

    let id = read_i64(buf, "id")?;
    let uuid = Uuid::from_slice(take(buf, 16, "uuid")?)
        .map_err(|_| CodecError::InvalidLength { field: "uuid", len: 16 })?;
    let created_at = timestamp(read_i64(buf, "created_at")?)?;
    let expired_at = timestamp(read_i64(buf, "expired_at")?)?;

    let access = read_string(buf, "access")?;
    let access = access
        .parse::<Access>()
        .map_err(|e| CodecError::UnknownAccess(e.0))?;
    let jwt = read_string(buf, "jwt")?;
    let user_id = read_i64(buf, "user_id")?;

    if buf.has_remaining() {
        return Err(CodecError::TrailingBytes(buf.remaining()));
    }

    Ok(Token {
        id,
        uuid,
        created_at,
        expired_at,
        access,
        jwt,
        user_id,
    })
}

fn ensure(buf: &&[u8], needed: usize, field: &'static str) -> Result<(), CodecError> {
    if buf.remaining() < needed {
        return Err(CodecError::Underrun {
            field,
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

fn read_i64(buf: &mut &[u8], field: &'static str) -> Result<i64, CodecError> {
    ensure(buf, 8, field)?;
    Ok(buf.get_i64())
}

fn take<'a>(buf: &mut &'a [u8], len: usize, field: &'static str) -> Result<&'a [u8], CodecError> {
    ensure(buf, len, field)?;
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}

fn read_string(buf: &mut &[u8], field: &'static str) -> Result<String, CodecError> {
    let len = read_i64(buf, field)?;
    let len = usize::try_from(len).map_err(|_| CodecError::InvalidLength { field, len })?;
    let bytes = take(buf, len, field)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8(field))
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, CodecError> {
    DateTime::from_timestamp(secs, 0).ok_or(CodecError::InvalidTimestamp(secs))
}
