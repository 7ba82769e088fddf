//! Mapping of ledger errors onto HTTP responses.
//!
//! Every failure is returned as `{"error": kind, "message": text}` where
//! `kind` is the stable snake_case [`ErrorKind`] and `text` is the
//! client-safe message.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bux_ledger::{BuxError, ErrorKind};
use serde::Serialize;

use crate::metrics;

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorKind,
    pub message: String,
}

/// Handler error wrapping a domain failure
#[derive(Debug)]
pub struct ApiError(pub BuxError);

impl From<BuxError> for ApiError {
    fn from(err: BuxError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(BuxError::InvalidArgument(rejection.body_text()))
    }
}

/// HTTP status for an error kind
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyRedeemed
        | ErrorKind::SelfTransfer
        | ErrorKind::SelfRedeem
        | ErrorKind::AlreadyInProgress
        | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);

        if kind == ErrorKind::Internal {
            tracing::error!(error = %self.0, "Request failed with internal error");
        } else {
            tracing::debug!(error = %self.0, kind = %kind, "Request rejected");
        }
        metrics::errors_total(&kind.to_string());

        let body = ErrorResponse {
            error: kind,
            message: self.0.client_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Unwrap a JSON body, turning extractor rejections into `invalid_argument`
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(ApiError::from)
}
