//! Authentication middleware for protected endpoints.
//!
//! Extracts the bearer token from the `Authorization` header, verifies it and
//! injects the caller's [`UserId`] into request extensions for downstream
//! handlers.
//!
//! # Extracting the caller
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//! use bux_ledger::auth::UserId;
//!
//! async fn protected_handler(Extension(user_id): Extension<UserId>) -> String {
//!     format!("Authenticated as {}", user_id)
//! }
//! # let _ = protected_handler;
//! ```

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use bux_ledger::{BuxError, auth::UserId};

use super::{AppState, error::ApiError, request_id::RequestId};
use crate::logging::log_security_event;

/// Validates the bearer token and injects the verified [`UserId`].
///
/// # Behavior
///
/// - **Success**: Token valid → Injects `UserId` into request extensions → Calls next handler
/// - **Missing header or wrong scheme**: `401` with `unauthenticated` body
/// - **Invalid/expired token**: `401` with `unauthenticated` body
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.as_str().to_string());

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let Some(token) = token else {
        log_security_event(
            "missing_token",
            None,
            request_id.as_deref(),
            "Request without bearer token",
        );
        return Err(BuxError::Unauthenticated.into());
    };

    match state.verifier.verify(token) {
        Ok(user_id) => {
            request.extensions_mut().insert::<UserId>(user_id);
            Ok(next.run(request).await)
        }
        Err(e) => {
            log_security_event("invalid_token", None, request_id.as_deref(), &e.to_string());
            Err(BuxError::Unauthenticated.into())
        }
    }
}
