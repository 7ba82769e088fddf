//! Structured logging configuration.
//!
//! The ledger library logs through the `log` facade; the subscriber
//! installed here also captures those records, so library and server lines
//! share one filter and one format.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Requests slower than this are logged at warn level
pub const SLOW_REQUEST_MS: u64 = 1_000;

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use bux_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Arguments
///
/// * `event_type` - Type of security event
/// * `user_id` - Optional user ID
/// * `request_id` - Optional request ID for correlation
/// * `message` - Event message
///
/// # Example
///
/// ```
/// use bux_server::logging::log_security_event;
///
/// log_security_event("invalid_token", None, Some("3f1c"), "Token signature mismatch");
/// ```
pub fn log_security_event(
    event_type: &str,
    user_id: Option<&str>,
    request_id: Option<&str>,
    message: &str,
) {
    tracing::warn!(
        event_type = event_type,
        user_id = user_id,
        request_id = request_id,
        "SECURITY: {}",
        message
    );
}

/// Log API request/response
///
/// Slow requests are raised to warn level.
///
/// # Arguments
///
/// * `method` - HTTP method
/// * `path` - Request path
/// * `status_code` - Response status code
/// * `duration_ms` - Request duration in milliseconds
/// * `request_id` - Request ID
pub fn log_api_request(
    method: &str,
    path: &str,
    status_code: u16,
    duration_ms: u64,
    request_id: &str,
) {
    if duration_ms > SLOW_REQUEST_MS {
        tracing::warn!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            request_id = request_id,
            "PERFORMANCE: Slow request"
        );
    } else {
        tracing::info!(
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            request_id = request_id,
            "API request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_security_event() {
        // Just ensure it doesn't panic
        log_security_event("invalid_token", Some("alice"), Some("req-1"), "Test message");
        log_security_event("missing_token", None, None, "Test message");
    }

    #[test]
    fn test_log_api_request() {
        log_api_request("GET", "/api/v1/account", 200, 45, "req-1");
        log_api_request("POST", "/api/v1/wheel/spin", 402, 2_000, "req-2");
    }
}
