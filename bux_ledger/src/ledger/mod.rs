//! Per-user BUX balances.
//!
//! Every balance change is a single-key atomic update on `account:{id}`, so
//! concurrent debits on one account serialize and can never overdraw it.
//! Transfers are two updates (debit, then credit) and the credit is retried
//! until it lands.

pub mod manager;
pub mod models;

pub use manager::BalanceLedger;
pub use models::{Account, AccountSetup, TransferReceipt};

use crate::errors::{BuxError, BuxResult};

/// Reject zero amounts before any store access.
pub fn ensure_positive(amount: u64, what: &str) -> BuxResult<u64> {
    if amount == 0 {
        return Err(BuxError::InvalidArgument(format!(
            "{what} must be a positive integer"
        )));
    }
    Ok(amount)
}
