//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use bux_ledger::{
    HeistConfig, LedgerConfig, RetryPolicy,
    auth::verifier::MIN_SECRET_LEN,
    config::{
        DEFAULT_HEIST_ENTRY_COST, DEFAULT_HEIST_PAYOUT_MULTIPLIER, DEFAULT_HEIST_SUCCESS_PERCENT,
        DEFAULT_STARTING_BALANCE,
    },
    db::DatabaseConfig,
    retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY},
};
use std::{fmt, net::SocketAddr, str::FromStr, time::Duration};

/// Default HTTP bind address
pub const DEFAULT_BIND: SocketAddr =
    SocketAddr::V4(std::net::SocketAddrV4::new(std::net::Ipv4Addr::LOCALHOST, 8080));

/// Where ledger state is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process map; state is lost on restart
    Memory,
    /// PostgreSQL `kv_store` table
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            other => Err(ConfigError::Invalid {
                var: "STORE_BACKEND".to_string(),
                reason: format!("Unknown backend '{other}', expected 'memory' or 'postgres'"),
            }),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Postgres => write!(f, "postgres"),
        }
    }
}

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Store backend
    pub store: StoreBackend,
    /// Database configuration (used by the postgres backend)
    pub database: DatabaseConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Ledger and game rules
    pub ledger: LedgerConfig,
    /// Prometheus exporter address, disabled when unset
    pub metrics_bind: Option<SocketAddr>,
}

/// Security-related configuration
#[derive(Clone)]
pub struct SecurityConfig {
    /// JWT verification secret (required)
    pub jwt_secret: String,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `store_override` - Optional store backend override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        store_override: Option<StoreBackend>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = bind_override
            .or_else(|| {
                std::env::var("SERVER_BIND")
                    .ok()
                    .and_then(|s| s.parse().ok())
            })
            .unwrap_or(DEFAULT_BIND);

        let store = match store_override {
            Some(store) => store,
            None => std::env::var("STORE_BACKEND")
                .ok()
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or(StoreBackend::Memory),
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        // Security configuration (REQUIRED)
        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Generate with: openssl rand -hex 32".to_string(),
        })?;

        let ledger = LedgerConfig {
            starting_balance: parse_env_or("STARTING_BALANCE", DEFAULT_STARTING_BALANCE),
            heist: HeistConfig {
                entry_cost: parse_env_or("HEIST_ENTRY_COST", DEFAULT_HEIST_ENTRY_COST),
                success_percent: parse_env_or(
                    "HEIST_SUCCESS_PERCENT",
                    DEFAULT_HEIST_SUCCESS_PERCENT,
                ),
                payout_multiplier: parse_env_or(
                    "HEIST_PAYOUT_MULTIPLIER",
                    DEFAULT_HEIST_PAYOUT_MULTIPLIER,
                ),
            },
            retry: RetryPolicy {
                max_attempts: parse_env_or("RETRY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
                base_delay: Duration::from_millis(parse_env_or(
                    "RETRY_BASE_DELAY_MS",
                    DEFAULT_BASE_DELAY.as_millis() as u64,
                )),
                max_delay: DEFAULT_MAX_DELAY,
            },
        };

        let metrics_bind = std::env::var("METRICS_BIND")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.parse().map_err(|_| ConfigError::Invalid {
                    var: "METRICS_BIND".to_string(),
                    reason: format!("'{s}' is not a socket address"),
                })
            })
            .transpose()?;

        Ok(ServerConfig {
            bind,
            store,
            database,
            security: SecurityConfig { jwt_secret },
            ledger,
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: format!("Must be at least {MIN_SECRET_LEN} characters (128-bit security)"),
            });
        }

        let heist = &self.ledger.heist;
        if heist.entry_cost == 0 {
            return Err(ConfigError::Invalid {
                var: "HEIST_ENTRY_COST".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if heist.success_percent > 100 {
            return Err(ConfigError::Invalid {
                var: "HEIST_SUCCESS_PERCENT".to_string(),
                reason: "Must be between 0 and 100".to_string(),
            });
        }

        if heist.payout_multiplier == 0 {
            return Err(ConfigError::Invalid {
                var: "HEIST_PAYOUT_MULTIPLIER".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if heist.payout().is_none() {
            return Err(ConfigError::Invalid {
                var: "HEIST_PAYOUT_MULTIPLIER".to_string(),
                reason: format!(
                    "Entry cost ({}) times multiplier overflows",
                    heist.entry_cost
                ),
            });
        }

        if self.ledger.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "RETRY_MAX_ATTEMPTS".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        if self.ledger.retry.base_delay > self.ledger.retry.max_delay {
            return Err(ConfigError::Invalid {
                var: "RETRY_BASE_DELAY_MS".to_string(),
                reason: format!(
                    "Must not exceed the maximum delay ({} ms)",
                    self.ledger.retry.max_delay.as_millis()
                ),
            });
        }

        if self.store == StoreBackend::Postgres && self.database.database_url.is_empty() {
            return Err(ConfigError::MissingRequired {
                var: "DATABASE_URL".to_string(),
                hint: "Required when STORE_BACKEND=postgres".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
