//! Heist data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankStatus {
    Safe,
    InProgress,
}

/// Global bank record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankState {
    pub status: BankStatus,
    /// Members of the running heist, starter first
    pub crew: Vec<UserId>,
    pub started_at: Option<DateTime<Utc>>,
}

impl BankState {
    pub fn safe() -> Self {
        Self {
            status: BankStatus::Safe,
            crew: Vec::new(),
            started_at: None,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == BankStatus::InProgress
    }

    pub fn has_member(&self, user_id: &UserId) -> bool {
        self.crew.contains(user_id)
    }
}

impl Default for BankState {
    fn default() -> Self {
        Self::safe()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Playing,
    Escaped,
    Caught,
}

/// Per-user record under `heist:crew:{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participation {
    pub status: ParticipantStatus,
    pub payout: u64,
    pub updated_at: DateTime<Utc>,
}

impl Participation {
    pub fn playing() -> Self {
        Self {
            status: ParticipantStatus::Playing,
            payout: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Paid entry into a heist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeistEntry {
    pub entry_cost: u64,
    pub new_balance: u64,
    pub crew_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeistOutcome {
    Escaped,
    Caught,
}

/// Result of settling a heist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeistReport {
    pub outcome: HeistOutcome,
    pub crew: Vec<UserId>,
    pub payout_each: u64,
}

/// Bank state as seen by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeistStatus {
    pub bank_status: BankStatus,
    pub crew_size: usize,
    pub entry_cost: u64,
    pub participation: Option<Participation>,
}
