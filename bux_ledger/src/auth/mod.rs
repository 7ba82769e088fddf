//! Caller identity.
//!
//! Authentication itself belongs to an external identity provider. This
//! module only verifies the HS256 bearer tokens it mints and exposes the
//! opaque [`UserId`] every ledger and game operation requires.
//!
//! ## Example
//!
//! ```
//! use bux_ledger::auth::{TokenVerifier, UserId};
//! use chrono::Duration;
//!
//! let verifier = TokenVerifier::new("0123456789abcdef0123456789abcdef".to_string()).unwrap();
//! let alice = UserId::new("alice").unwrap();
//! let token = verifier.issue(&alice, Duration::minutes(15)).unwrap();
//! assert_eq!(verifier.verify(&token).unwrap(), alice);
//! ```

pub mod errors;
pub mod models;
pub mod verifier;

pub use errors::{AuthError, AuthResult};
pub use models::{AccessTokenClaims, UserId};
pub use verifier::TokenVerifier;
