//! # BUX Ledger
//!
//! Virtual-currency ledger and mini-game engine. Every user holds a
//! non-negative integer balance of BUX that can be gifted, locked into
//! single-use value codes, or wagered on a multiplier wheel, blackjack and a
//! cooperative bank heist.
//!
//! All state lives behind an [`AtomicStore`](store::AtomicStore). Each
//! balance change is one single-key atomic read-modify-write, so concurrent
//! requests can neither overdraw an account nor redeem a code twice.
//! Sequences spanning several keys (transfers, heist entry) order their
//! steps so a failure is either side-effect free or compensated.
//!
//! ## Core Modules
//!
//! - [`store`]: Atomic key-value store trait with in-memory and PostgreSQL backends
//! - [`ledger`]: Debit, credit and transfer
//! - [`codes`]: Value code issuance and exactly-once redemption
//! - [`game`]: Wheel and blackjack
//! - [`heist`]: Global one-at-a-time heist coordination
//! - [`auth`]: Caller identity and bearer-token verification
//!
//! ## Example
//!
//! ```
//! use bux_ledger::{LedgerConfig, Services, auth::UserId, store::MemoryStore};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), bux_ledger::BuxError> {
//! let services = Services::new(Arc::new(MemoryStore::new()), LedgerConfig::default());
//! let alice = UserId::new("alice").unwrap();
//! let bob = UserId::new("bob").unwrap();
//!
//! services.ledger.setup_account(&alice).await?;
//! services.ledger.setup_account(&bob).await?;
//! services.ledger.transfer(&alice, &bob, 250).await?;
//!
//! assert_eq!(services.ledger.balance(&alice).await?, 750);
//! assert_eq!(services.ledger.balance(&bob).await?, 1_250);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod codes;
pub mod config;
pub mod db;
pub mod errors;
pub mod game;
pub mod heist;
pub mod ledger;
pub mod retry;
pub mod store;

pub use config::{HeistConfig, LedgerConfig};
pub use errors::{BuxError, BuxResult, ErrorKind};
pub use retry::RetryPolicy;

use std::sync::Arc;

use codes::CodeRegistry;
use game::{BlackjackEngine, OutcomeSource, ThreadRngSource, WheelGame};
use heist::HeistCoordinator;
use ledger::BalanceLedger;
use store::AtomicStore;

/// Every component wired over one store
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn AtomicStore>,
    pub ledger: BalanceLedger,
    pub codes: CodeRegistry,
    pub wheel: WheelGame,
    pub blackjack: BlackjackEngine,
    pub heist: HeistCoordinator,
}

impl Services {
    /// Wire all components with the thread-local RNG as outcome source
    pub fn new(store: Arc<dyn AtomicStore>, config: LedgerConfig) -> Self {
        Self::with_source(store, config, Arc::new(ThreadRngSource))
    }

    /// Wire all components with a custom outcome source for the wheel and heist
    pub fn with_source(
        store: Arc<dyn AtomicStore>,
        config: LedgerConfig,
        source: Arc<dyn OutcomeSource>,
    ) -> Self {
        let ledger = BalanceLedger::new(store.clone(), config.starting_balance, config.retry);

        Self {
            codes: CodeRegistry::new(store.clone(), ledger.clone()),
            wheel: WheelGame::new(ledger.clone(), source.clone()),
            blackjack: BlackjackEngine::new(store.clone(), ledger.clone()),
            heist: HeistCoordinator::new(store.clone(), ledger.clone(), config.heist, source),
            ledger,
            store,
        }
    }
}
