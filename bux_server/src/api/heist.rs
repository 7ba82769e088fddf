//! Bank heist API handlers.
//!
//! A heist is started by one user, joined by others while the bank is in
//! progress and resolved by any crew member calling settle.

use axum::{
    Json,
    extract::{Extension, State},
};
use bux_ledger::{
    auth::UserId,
    heist::{HeistEntry, HeistOutcome, HeistReport, HeistStatus},
};

use super::{AppState, error::ApiError};
use crate::metrics;

pub async fn start_heist(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<HeistEntry>, ApiError> {
    let entry = state.services.heist.start(&user_id).await?;

    metrics::heist_events_total("started");
    Ok(Json(entry))
}

pub async fn join_heist(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<HeistEntry>, ApiError> {
    let entry = state.services.heist.join(&user_id).await?;

    metrics::heist_events_total("joined");
    Ok(Json(entry))
}

pub async fn settle_heist(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<HeistReport>, ApiError> {
    let report = state.services.heist.settle(&user_id).await?;

    metrics::heist_events_total(match report.outcome {
        HeistOutcome::Escaped => "escaped",
        HeistOutcome::Caught => "caught",
    });
    Ok(Json(report))
}

pub async fn heist_status(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<HeistStatus>, ApiError> {
    let status = state.services.heist.status(&user_id).await?;
    Ok(Json(status))
}
