//! HTTP API for the BUX ledger and arcade.
//!
//! Every endpoint except `/health` lives under `/api/v1` and requires a
//! bearer token. The caller identity is taken from the verified token, never
//! from the request body.
//!
//! # Modules
//!
//! - [`account`]: Account setup, balance lookup and transfers
//! - [`codes`]: Value code issuance and redemption
//! - [`games`]: Wheel spins and blackjack hands
//! - [`heist`]: Cooperative bank heist
//! - [`middleware`]: Authentication middleware for protected endpoints
//! - [`request_id`]: Request correlation ids and request logging
//! - [`error`]: Mapping of ledger errors onto HTTP responses
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use bux_ledger::{LedgerConfig, Services, auth::TokenVerifier, store::MemoryStore};
//! use bux_server::api::{AppState, create_router};
//! use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let services = Services::new(Arc::new(MemoryStore::new()), LedgerConfig::default());
//! let verifier = TokenVerifier::new("0123456789abcdef0123456789abcdef".to_string())?;
//! let state = AppState {
//!     services,
//!     verifier: Arc::new(verifier),
//! };
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod account;
pub mod codes;
pub mod error;
pub mod games;
pub mod heist;
pub mod middleware;
pub mod request_id;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use bux_ledger::{Services, auth::TokenVerifier};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub verifier: Arc<TokenVerifier>,
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Endpoint Summary
///
/// ```text
/// GET  /health                  - Store health (public)
/// POST /api/v1/account          - Create account with starting balance
/// GET  /api/v1/account          - Current account
/// POST /api/v1/transfers        - Transfer BUX to another user
/// POST /api/v1/codes            - Issue a value code
/// POST /api/v1/codes/redeem     - Redeem a value code
/// POST /api/v1/wheel/spin       - Spin the wheel
/// POST /api/v1/blackjack/deal   - Deal a blackjack hand
/// POST /api/v1/blackjack/hit    - Draw a card
/// POST /api/v1/blackjack/stand  - Stand and settle
/// GET  /api/v1/blackjack        - Current hand
/// POST /api/v1/heist/start      - Start a heist
/// POST /api/v1/heist/join       - Join the running heist
/// POST /api/v1/heist/settle     - Resolve the running heist
/// GET  /api/v1/heist            - Bank status and own participation
/// ```
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/account",
            post(account::setup_account).get(account::get_account),
        )
        .route("/transfers", post(account::transfer))
        .route("/codes", post(codes::issue_code))
        .route("/codes/redeem", post(codes::redeem_code))
        .route("/wheel/spin", post(games::spin_wheel))
        .route("/blackjack", get(games::blackjack_session))
        .route("/blackjack/deal", post(games::blackjack_deal))
        .route("/blackjack/hit", post(games::blackjack_hit))
        .route("/blackjack/stand", post(games::blackjack_stand))
        .route("/heist", get(heist::heist_status))
        .route("/heist/start", post(heist::start_heist))
        .route("/heist/join", post(heist::join_heist))
        .route("/heist/settle", post(heist::settle_heist))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ))
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the store answers its health check, `503 Service
/// Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","version":"0.1.0","store":true,"timestamp":"2026-01-05T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = match state.services.store.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Store health check failed");
            false
        }
    };

    let status_code = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if store_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": store_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
