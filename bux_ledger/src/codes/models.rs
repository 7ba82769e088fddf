//! Value code data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::UserId;

/// Value code record stored under `code:{code}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCode {
    pub code: String,
    pub amount: u64,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    pub redeemed_by: Option<UserId>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl ValueCode {
    pub fn is_redeemed(&self) -> bool {
        self.redeemed_by.is_some()
    }
}

/// Successful redemption
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redemption {
    pub code: String,
    pub amount: u64,
    /// Redeemer balance after the credit
    pub new_balance: u64,
}
