//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::UserId;

/// Account record stored under `account:{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub balance: u64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: UserId, balance: u64) -> Self {
        Self {
            id,
            balance,
            created_at: Utc::now(),
        }
    }
}

/// Result of `setup_account`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSetup {
    pub account: Account,
    /// This call created the account
    pub created: bool,
}

/// Result of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub from: UserId,
    pub to: UserId,
    pub amount: u64,
    /// Sender balance right after the debit
    pub sender_balance: u64,
}
