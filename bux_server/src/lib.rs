//! HTTP server for the BUX ledger and arcade.
//!
//! Exposes the ledger, value codes, wheel, blackjack and heist over a JSON
//! API. The binary in `main.rs` wires configuration, logging, metrics and the
//! store backend; this library holds everything the integration tests drive.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
