//! Value code API handlers.
//!
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/codes/redeem \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"code": "LBX-7KQ2M9XA"}'
//! ```

use axum::{
    Json,
    extract::{Extension, State, rejection::JsonRejection},
    http::StatusCode,
};
use bux_ledger::{
    auth::UserId,
    codes::{Redemption, ValueCode},
};
use serde::Deserialize;

use super::{
    AppState,
    error::{ApiError, json_body},
};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct IssueCodeRequest {
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct RedeemCodeRequest {
    pub code: String,
}

/// Debit the caller and mint a one-time code worth `amount`.
pub async fn issue_code(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    payload: Result<Json<IssueCodeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ValueCode>), ApiError> {
    let request = json_body(payload)?;
    let code = state.services.codes.issue(&user_id, request.amount).await?;

    metrics::codes_issued_total(code.amount);
    Ok((StatusCode::CREATED, Json(code)))
}

/// Redeem a code for the caller. Codes are matched case-insensitively.
pub async fn redeem_code(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    payload: Result<Json<RedeemCodeRequest>, JsonRejection>,
) -> Result<Json<Redemption>, ApiError> {
    let request = json_body(payload)?;
    let redemption = state.services.codes.redeem(&user_id, &request.code).await?;

    metrics::codes_redeemed_total();
    Ok(Json(redemption))
}
