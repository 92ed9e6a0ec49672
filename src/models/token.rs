use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authorization tag carried by a token and by every verification request.
///
/// `All` is the grant wildcard (a token that may do anything), `Any` is the
/// request wildcard (a caller that only needs a live token). Every other
/// value must match exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Reset,
    Activate,
    All,
    Any,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Reset => "reset",
            Access::Activate => "activate",
            Access::All => "all",
            Access::Any => "any",
        }
    }

    /// Whether a token holding `self` satisfies a request for `requested`.
    pub fn grants(&self, requested: Access) -> bool {
        requested == *self || *self == Access::All || requested == Access::Any
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown access scope '{0}'")]
pub struct UnknownAccess(pub String);

impl FromStr for Access {
    type Err = UnknownAccess;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reset" => Ok(Access::Reset),
            "activate" => Ok(Access::Activate),
            "all" => Ok(Access::All),
            "any" => Ok(Access::Any),
            other => Err(UnknownAccess(other.to_string())),
        }
    }
}

/// A bearer credential. `uuid` is the storage key and the JWT `jti`;
/// `user_id` is the JWT `sub`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub id: i64,
    pub uuid: Uuid,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
    pub access: Access,
    pub jwt: String,
    pub user_id: i64,
}
