//! Game and ledger tuning shared by every component.

use crate::retry::RetryPolicy;

/// Balance granted to a freshly created account
pub const DEFAULT_STARTING_BALANCE: u64 = 1_000;

/// Cost to start or join a heist
pub const DEFAULT_HEIST_ENTRY_COST: u64 = 100;

/// Chance (percent) that a heist crew escapes with the loot
pub const DEFAULT_HEIST_SUCCESS_PERCENT: u8 = 50;

/// Escaped crew members receive `entry_cost * multiplier`
pub const DEFAULT_HEIST_PAYOUT_MULTIPLIER: u64 = 3;

/// Heist rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeistConfig {
    pub entry_cost: u64,
    pub success_percent: u8,
    pub payout_multiplier: u64,
}

impl Default for HeistConfig {
    fn default() -> Self {
        Self {
            entry_cost: DEFAULT_HEIST_ENTRY_COST,
            success_percent: DEFAULT_HEIST_SUCCESS_PERCENT,
            payout_multiplier: DEFAULT_HEIST_PAYOUT_MULTIPLIER,
        }
    }
}

impl HeistConfig {
    /// Payout credited to each member of an escaped crew
    pub fn payout(&self) -> Option<u64> {
        self.entry_cost.checked_mul(self.payout_multiplier)
    }
}

/// Configuration for [`crate::Services`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    pub starting_balance: u64,
    pub heist: HeistConfig,
    pub retry: RetryPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: DEFAULT_STARTING_BALANCE,
            heist: HeistConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}
