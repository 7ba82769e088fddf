//! Integration tests for the HTTP surface.
//!
//! Drives the full router (auth, request ids, error mapping) against an
//! in-memory store.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use bux_ledger::{
    LedgerConfig, Services,
    auth::{TokenVerifier, UserId},
    game::FixedSource,
    store::MemoryStore,
};
use bux_server::api::{AppState, create_router, request_id::REQUEST_ID_HEADER};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot` method

const SECRET: &str = "test_secret_key_for_testing_only_0123456789";

struct TestServer {
    app: Router,
    verifier: TokenVerifier,
}

impl TestServer {
    /// Every chance draw lands on `draw` (wheel index 2 is ×1.5)
    fn new(draw: usize) -> Self {
        let services = Services::with_source(
            Arc::new(MemoryStore::new()),
            LedgerConfig::default(),
            Arc::new(FixedSource::always(draw)),
        );
        let verifier = TokenVerifier::new(SECRET.to_string()).unwrap();
        let state = AppState {
            services,
            verifier: Arc::new(verifier.clone()),
        };

        Self {
            app: create_router(state),
            verifier,
        }
    }

    fn token(&self, user: &str) -> String {
        self.verifier
            .issue(&UserId::new(user).unwrap(), chrono::Duration::minutes(5))
            .unwrap()
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(user)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

// ============================================================================
// Health and middleware
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let server = TestServer::new(0);
    let (status, body) = server.call("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], true);
}

#[tokio::test]
async fn test_protected_route_without_token_is_unauthenticated() {
    let server = TestServer::new(0);
    let (status, body) = server.call("GET", "/api/v1/account", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let server = TestServer::new(0);
    let forger = TokenVerifier::new("another_secret_key_that_is_long_enough_x".to_string()).unwrap();
    let token = forger
        .issue(&UserId::new("mallory").unwrap(), chrono::Duration::minutes(5))
        .unwrap();

    let request = Request::builder()
        .uri("/api/v1/account")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let server = TestServer::new(0);

    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "trace-me")
        .body(Body::empty())
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "trace-me");

    // Rejected requests carry one too
    let request = Request::builder()
        .uri("/api/v1/account")
        .body(Body::empty())
        .unwrap();
    let response = server.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
}

// ============================================================================
// Accounts and transfers
// ============================================================================

#[tokio::test]
async fn test_account_setup_is_idempotent() {
    let server = TestServer::new(0);

    let (status, body) = server.call("POST", "/api/v1/account", Some("alice"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["balance"], 1000);
    assert_eq!(body["id"], "alice");

    let (status, body) = server.call("POST", "/api/v1/account", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 1000);
}

#[tokio::test]
async fn test_concurrent_account_setup_creates_once() {
    let server = TestServer::new(0);
    let setup = || server.call("POST", "/api/v1/account", Some("alice"), None);

    let results = tokio::join!(setup(), setup(), setup(), setup());
    let statuses = [results.0.0, results.1.0, results.2.0, results.3.0];

    let created = statuses.iter().filter(|&&s| s == StatusCode::CREATED).count();
    let existing = statuses.iter().filter(|&&s| s == StatusCode::OK).count();
    assert_eq!((created, existing), (1, 3));
}

#[tokio::test]
async fn test_get_missing_account_is_not_found() {
    let server = TestServer::new(0);
    let (status, body) = server.call("GET", "/api/v1/account", Some("ghost"), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_transfer_flow() {
    let server = TestServer::new(0);
    server.call("POST", "/api/v1/account", Some("alice"), None).await;
    server.call("POST", "/api/v1/account", Some("bob"), None).await;

    let (status, body) = server
        .call(
            "POST",
            "/api/v1/transfers",
            Some("alice"),
            Some(json!({"to": "bob", "amount": 250})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sender_balance"], 750);

    let (_, body) = server.call("GET", "/api/v1/account", Some("bob"), None).await;
    assert_eq!(body["balance"], 1250);
}

#[tokio::test]
async fn test_transfer_errors_map_to_status_codes() {
    let server = TestServer::new(0);
    server.call("POST", "/api/v1/account", Some("alice"), None).await;
    server.call("POST", "/api/v1/account", Some("bob"), None).await;

    let cases = [
        (json!({"to": "alice", "amount": 5}), StatusCode::CONFLICT, "self_transfer"),
        (json!({"to": "bob", "amount": 0}), StatusCode::BAD_REQUEST, "invalid_argument"),
        (json!({"to": "carol", "amount": 5}), StatusCode::NOT_FOUND, "not_found"),
        (
            json!({"to": "bob", "amount": 5_000}),
            StatusCode::PAYMENT_REQUIRED,
            "insufficient_funds",
        ),
        (json!({"to": "bob", "amount": -5}), StatusCode::BAD_REQUEST, "invalid_argument"),
        (json!({"recipient": "bob"}), StatusCode::BAD_REQUEST, "invalid_argument"),
    ];

    for (request, expected_status, expected_kind) in cases {
        let (status, body) = server
            .call("POST", "/api/v1/transfers", Some("alice"), Some(request.clone()))
            .await;
        assert_eq!(status, expected_status, "request {request}");
        assert_eq!(body["error"], expected_kind, "request {request}");
        assert!(body["message"].is_string());
    }

    // Nothing moved
    let (_, body) = server.call("GET", "/api/v1/account", Some("alice"), None).await;
    assert_eq!(body["balance"], 1000);
}

// ============================================================================
// Value codes
// ============================================================================

#[tokio::test]
async fn test_issue_and_redeem_code() {
    let server = TestServer::new(0);
    server.call("POST", "/api/v1/account", Some("alice"), None).await;
    server.call("POST", "/api/v1/account", Some("bob"), None).await;

    let (status, body) = server
        .call("POST", "/api/v1/codes", Some("alice"), Some(json!({"amount": 50})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["amount"], 50);
    let code = body["code"].as_str().unwrap().to_string();
    assert!(code.starts_with("LBX-"));

    let (status, body) = server
        .call(
            "POST",
            "/api/v1/codes/redeem",
            Some("alice"),
            Some(json!({"code": code})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "self_redeem");

    // Lowercase input is normalized
    let (status, body) = server
        .call(
            "POST",
            "/api/v1/codes/redeem",
            Some("bob"),
            Some(json!({"code": code.to_lowercase()})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_balance"], 1050);

    let (status, body) = server
        .call(
            "POST",
            "/api/v1/codes/redeem",
            Some("bob"),
            Some(json!({"code": code})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_redeemed");

    let (_, body) = server.call("GET", "/api/v1/account", Some("alice"), None).await;
    assert_eq!(body["balance"], 950);
}

// ============================================================================
// Games
// ============================================================================

#[tokio::test]
async fn test_wheel_spin_pays_out() {
    let server = TestServer::new(2);
    server.call("POST", "/api/v1/account", Some("alice"), None).await;

    let (status, body) = server
        .call("POST", "/api/v1/wheel/spin", Some("alice"), Some(json!({"bet": 100})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payout"], 150);
    assert_eq!(body["outcome"], "win");
    assert_eq!(body["new_balance"], 1050);
}

#[tokio::test]
async fn test_blackjack_deal_masks_hole_card_and_blocks_second_deal() {
    let server = TestServer::new(0);
    server.call("POST", "/api/v1/account", Some("alice"), None).await;

    let (status, body) = server
        .call("POST", "/api/v1/blackjack/deal", Some("alice"), Some(json!({"bet": 100})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["player_hand"].as_array().unwrap().len(), 2);
    assert_eq!(body["dealer_hand"][1], Value::Null);
    assert_eq!(body["status"], "playing");

    let (status, body) = server
        .call("POST", "/api/v1/blackjack/deal", Some("alice"), Some(json!({"bet": 100})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_in_progress");

    let (status, _) = server.call("GET", "/api/v1/blackjack", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server
        .call("POST", "/api/v1/blackjack/stand", Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["outcome"].is_string());

    let (status, body) = server
        .call("POST", "/api/v1/blackjack/stand", Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_heist_lifecycle() {
    // Draw 0 is below any positive success percent, so the crew escapes
    let server = TestServer::new(0);
    for user in ["alice", "bob"] {
        server.call("POST", "/api/v1/account", Some(user), None).await;
    }

    let (status, body) = server.call("POST", "/api/v1/heist/start", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["crew_size"], 1);

    let (status, body) = server.call("POST", "/api/v1/heist/start", Some("bob"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_in_progress");

    let (status, body) = server.call("POST", "/api/v1/heist/join", Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["crew_size"], 2);

    let (status, body) = server.call("GET", "/api/v1/heist", Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bank_status"], "in_progress");

    let (status, body) = server.call("POST", "/api/v1/heist/settle", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "escaped");
    assert_eq!(body["payout_each"], 300);

    let (_, body) = server.call("GET", "/api/v1/account", Some("bob"), None).await;
    assert_eq!(body["balance"], 1200);

    let (_, body) = server.call("GET", "/api/v1/heist", Some("bob"), None).await;
    assert_eq!(body["bank_status"], "safe");
}
