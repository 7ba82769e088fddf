//! Prometheus metrics for monitoring ledger and game activity.
//!
//! Metrics are exported in Prometheus text format by a scrape listener on
//! `METRICS_BIND`. When no exporter is installed the recording calls are
//! no-ops.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts and duration by route and status
//! - **Ledger Metrics**: Transfers and BUX moved
//! - **Code Metrics**: Codes issued and redeemed
//! - **Game Metrics**: Spins, blackjack hands and heists by outcome
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use bux_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/v1/transfers", 200);
//! metrics::wheel_spins_total("win");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

/// Record a failed operation by error kind.
pub fn errors_total(kind: &str) {
    metrics::counter!("errors_total", "kind" => kind.to_string()).increment(1);
}

// ============================================================================
// Ledger Metrics
// ============================================================================

/// Increment accounts created counter.
pub fn accounts_created_total() {
    metrics::counter!("accounts_created_total").increment(1);
}

/// Record a completed transfer.
pub fn transfers_total(amount: u64) {
    metrics::counter!("transfers_total").increment(1);
    metrics::counter!("transferred_bux_total").increment(amount);
}

// ============================================================================
// Code Metrics
// ============================================================================

pub fn codes_issued_total(amount: u64) {
    metrics::counter!("codes_issued_total").increment(1);
    metrics::histogram!("code_amount_bux").record(amount as f64);
}

pub fn codes_redeemed_total() {
    metrics::counter!("codes_redeemed_total").increment(1);
}

// ============================================================================
// Game Metrics
// ============================================================================

/// Record a wheel spin by outcome kind.
pub fn wheel_spins_total(outcome: &str) {
    metrics::counter!("wheel_spins_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record bet size distribution.
pub fn bet_size_bux(game: &str, bet: u64) {
    metrics::histogram!("bet_size_bux", "game" => game.to_string()).record(bet as f64);
}

/// Record a finished blackjack hand by outcome.
pub fn blackjack_hands_total(outcome: &str) {
    metrics::counter!("blackjack_hands_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a heist lifecycle event (`started`, `joined`, `escaped`, `caught`).
pub fn heist_events_total(event: &str) {
    metrics::counter!("heist_events_total", "event" => event.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        http_requests_total("GET", "/health", 200);
        http_request_duration_ms("GET", "/health", 1.5);
        errors_total("conflict");
        transfers_total(10);
        codes_issued_total(50);
        wheel_spins_total("bankrupt");
        blackjack_hands_total("push");
        heist_events_total("started");
    }
}
