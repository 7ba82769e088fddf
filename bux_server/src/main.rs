//! BUX ledger and arcade server.
//!
//! Loads configuration, connects the chosen store backend and serves the
//! HTTP API until Ctrl+C.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Error};
use bux_ledger::{
    Services,
    auth::TokenVerifier,
    db::Database,
    store::{AtomicStore, MemoryStore, PgStore},
};
use bux_server::{
    api,
    config::{ServerConfig, StoreBackend},
    logging, metrics,
};
use log::info;
use pico_args::Arguments;

const HELP: &str = "\
Run the BUX ledger and arcade server

USAGE:
  bux_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --store      BACKEND     memory | postgres           [default: env STORE_BACKEND or memory]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  STORE_BACKEND            memory or postgres
  DATABASE_URL             PostgreSQL connection string
  JWT_SECRET               Token verification secret (required, at least 32 chars)
  STARTING_BALANCE         BUX granted on account setup
  HEIST_ENTRY_COST         BUX paid to start or join a heist
  HEIST_SUCCESS_PERCENT    Chance of a heist escaping (0-100)
  HEIST_PAYOUT_MULTIPLIER  Escape payout as a multiple of the entry cost
  METRICS_BIND             Prometheus exporter address (disabled when unset)
  (See .env.example for all configuration options)
";

struct Args {
    bind: Option<SocketAddr>,
    store: Option<StoreBackend>,
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        store: pargs.opt_value_from_str("--store")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
    };

    let config = ServerConfig::from_env(args.bind, args.store, args.database_url)?;
    config.validate()?;

    logging::init();
    info!("Starting BUX server at {} with {} store", config.bind, config.store);

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics exported on {metrics_bind}");
    }

    let store: Arc<dyn AtomicStore> = match config.store {
        StoreBackend::Memory => {
            log::warn!("Using in-memory store; balances are lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Postgres => {
            let db = Database::new(&config.database)
                .await
                .context("Failed to connect to database")?;
            info!("Database connected successfully");

            let store = PgStore::new(Arc::new(db.pool().clone()));
            store
                .ensure_schema()
                .await
                .context("Failed to create kv_store schema")?;
            Arc::new(store)
        }
    };

    let services = Services::new(store, config.ledger);
    services
        .heist
        .initialize()
        .await
        .context("Failed to initialize heist bank")?;

    let verifier = TokenVerifier::new(config.security.jwt_secret.clone())?;
    let state = api::AppState {
        services,
        verifier: Arc::new(verifier),
    };

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to install Ctrl+C handler: {e}");
        std::future::pending::<()>().await;
    }
}
