//! Bearer token verification for the external identity provider.

use super::{
    errors::{AuthError, AuthResult},
    models::{AccessTokenClaims, UserId},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

/// Minimum HS256 secret length (128-bit security).
pub const MIN_SECRET_LEN: usize = 32;

/// Verifies HS256 access tokens minted by the identity provider and turns
/// them into a [`UserId`].
#[derive(Clone)]
pub struct TokenVerifier {
    jwt_secret: String,
}

impl TokenVerifier {
    /// Create a verifier for the shared signing secret
    ///
    /// # Errors
    ///
    /// * `AuthError::WeakSecret` - Secret shorter than [`MIN_SECRET_LEN`]
    pub fn new(jwt_secret: String) -> AuthResult<Self> {
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::WeakSecret(MIN_SECRET_LEN));
        }
        Ok(Self { jwt_secret })
    }

    /// Verify an access token and return the caller identity
    ///
    /// # Arguments
    ///
    /// * `token` - Raw JWT from the `Authorization` header
    ///
    /// # Returns
    ///
    /// * `AuthResult<UserId>` - Verified identity from the `sub` claim
    pub fn verify(&self, token: &str) -> AuthResult<UserId> {
        let token_data = decode::<AccessTokenClaims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;

        UserId::new(&token_data.claims.sub)
    }

    /// Mint a token for `user_id`. Only used by local tooling and tests; the
    /// identity provider issues production tokens.
    pub fn issue(&self, user_id: &UserId, ttl: Duration) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok(token)
    }
}
