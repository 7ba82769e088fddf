//! Wheel and blackjack API handlers.
//!
//! # Examples
//!
//! Spin the wheel:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/wheel/spin \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"bet": 100}'
//! ```
//!
//! Play a blackjack hand:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/blackjack/deal \
//!   -H "Authorization: Bearer TOKEN" -H "Content-Type: application/json" -d '{"bet": 50}'
//! curl -X POST http://localhost:8080/api/v1/blackjack/hit -H "Authorization: Bearer TOKEN"
//! curl -X POST http://localhost:8080/api/v1/blackjack/stand -H "Authorization: Bearer TOKEN"
//! ```

use axum::{
    Json,
    extract::{Extension, State, rejection::JsonRejection},
};
use bux_ledger::{
    auth::UserId,
    game::{HitResult, SessionStatus, SessionView, SpinResult, StandResult},
};
use serde::Deserialize;

use super::{
    AppState,
    error::{ApiError, json_body},
};
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct BetRequest {
    pub bet: u64,
}

pub async fn spin_wheel(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    payload: Result<Json<BetRequest>, JsonRejection>,
) -> Result<Json<SpinResult>, ApiError> {
    let request = json_body(payload)?;
    let result = state.services.wheel.spin(&user_id, request.bet).await?;

    metrics::bet_size_bux("wheel", result.bet);
    metrics::wheel_spins_total(result.outcome.as_str());
    Ok(Json(result))
}

/// Deal a new hand. The dealer's hole card is masked in the response.
pub async fn blackjack_deal(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    payload: Result<Json<BetRequest>, JsonRejection>,
) -> Result<Json<SessionView>, ApiError> {
    let request = json_body(payload)?;
    let view = state.services.blackjack.deal(&user_id, request.bet).await?;

    metrics::bet_size_bux("blackjack", view.bet);
    Ok(Json(view))
}

pub async fn blackjack_hit(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<HitResult>, ApiError> {
    let result = state.services.blackjack.hit(&user_id).await?;

    if result.status == SessionStatus::Busted {
        metrics::blackjack_hands_total("bust");
    }
    Ok(Json(result))
}

pub async fn blackjack_stand(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<StandResult>, ApiError> {
    let result = state.services.blackjack.stand(&user_id).await?;

    metrics::blackjack_hands_total(result.outcome.as_str());
    Ok(Json(result))
}

pub async fn blackjack_session(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<SessionView>, ApiError> {
    let view = state.services.blackjack.session(&user_id).await?;
    Ok(Json(view))
}
