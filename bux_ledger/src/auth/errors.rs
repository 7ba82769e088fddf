//! Caller identity error types.

use thiserror::Error;

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// JWT token error
    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    /// Token subject is not a usable user id
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    /// Signing secret rejected at construction
    #[error("Signing secret must be at least {0} bytes")]
    WeakSecret(usize),
}

impl AuthError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// JWT errors are sanitized so token structure is never described to a client.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::JwtError(_) => "Authentication failed".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;
