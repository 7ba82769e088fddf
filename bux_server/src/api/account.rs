//! Account API handlers.
//!
//! # Examples
//!
//! Create the caller's account:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/account -H "Authorization: Bearer TOKEN"
//! ```
//!
//! Send BUX to another user:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/transfers \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"to": "bob", "amount": 25}'
//! ```

use axum::{
    Json,
    extract::{Extension, State, rejection::JsonRejection},
    http::StatusCode,
};
use bux_ledger::{
    BuxError,
    auth::UserId,
    ledger::{Account, TransferReceipt},
};
use serde::Deserialize;

use super::{
    AppState,
    error::{ApiError, json_body},
};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub to: String,
    pub amount: u64,
}

/// Create the caller's account with the starting balance.
///
/// Returns `201 Created` for a new account and `200 OK` with the existing
/// account otherwise.
pub async fn setup_account(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let setup = state.services.ledger.setup_account(&user_id).await?;

    let status = if setup.created {
        metrics::accounts_created_total();
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(setup.account)))
}

pub async fn get_account(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<Account>, ApiError> {
    let account = state.services.ledger.get_account(&user_id).await?;
    Ok(Json(account))
}

/// Move BUX from the caller to `to`.
pub async fn transfer(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferReceipt>, ApiError> {
    let request = json_body(payload)?;
    let to = UserId::new(&request.to)
        .map_err(|e| BuxError::InvalidArgument(format!("recipient: {e}")))?;

    let receipt = state
        .services
        .ledger
        .transfer(&user_id, &to, request.amount)
        .await?;

    metrics::transfers_total(receipt.amount);
    Ok(Json(receipt))
}
