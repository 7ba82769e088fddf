//! Caller identity models.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::{AuthError, AuthResult};

/// Longest accepted user id.
pub const MAX_USER_ID_LEN: usize = 128;

/// Opaque, verified identity of the caller.
///
/// The id is supplied by the external authentication collaborator and is
/// never interpreted beyond equality and use as a store key suffix.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> AuthResult<Self> {
        let trimmed = id.trim();
        if trimmed.is_empty() || trimmed.len() > MAX_USER_ID_LEN {
            return Err(AuthError::InvalidUserId(id.to_string()));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(AuthError::InvalidUserId(id.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// JWT access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String, // User ID
    pub exp: i64,    // Expiration timestamp
    pub iat: i64,    // Issued at timestamp
}
