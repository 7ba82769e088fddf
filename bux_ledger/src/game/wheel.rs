//! Multiplier wheel.
//!
//! The bet is debited before the segment is drawn, so two simultaneous spins
//! can never both pass a single balance check.

use super::chance::OutcomeSource;
use crate::{
    auth::UserId,
    errors::BuxResult,
    ledger::{BalanceLedger, ensure_positive},
};
use serde::Serialize;
use std::sync::Arc;

/// Payout rule of a segment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplier {
    /// `floor(bet * numerator / denominator)` is credited back.
    Ratio { numerator: u64, denominator: u64 },
    /// Balance is reset to exactly zero.
    Bankrupt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub multiplier: Multiplier,
    pub label: &'static str,
}

const fn ratio(numerator: u64, denominator: u64, label: &'static str) -> Segment {
    Segment {
        multiplier: Multiplier::Ratio {
            numerator,
            denominator,
        },
        label,
    }
}

/// Wheel segments in order. Each is drawn with probability 1/8.
pub const SEGMENTS: [Segment; 8] = [
    ratio(3, 1, "×3"),
    ratio(0, 1, "Lose"),
    ratio(3, 2, "×1.5"),
    Segment {
        multiplier: Multiplier::Bankrupt,
        label: "Bankrupt",
    },
    ratio(2, 1, "×2"),
    ratio(1, 3, "×⅓"),
    ratio(1, 1, "Safe"),
    ratio(0, 1, "Lose"),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Payout exceeds the bet
    Win,
    /// Some or all of the bet came back
    Neutral,
    /// Nothing came back
    Loss,
    /// Balance wiped
    Bankrupt,
}

impl OutcomeKind {
    /// Wire name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Win => "win",
            OutcomeKind::Neutral => "neutral",
            OutcomeKind::Loss => "loss",
            OutcomeKind::Bankrupt => "bankrupt",
        }
    }
}

/// Payout for `bet` on `segment`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub payout: u64,
    pub kind: OutcomeKind,
}

/// Resolve a bet against a segment without touching any balance.
pub fn resolve(bet: u64, segment: &Segment) -> Resolution {
    match segment.multiplier {
        Multiplier::Bankrupt => Resolution {
            payout: 0,
            kind: OutcomeKind::Bankrupt,
        },
        Multiplier::Ratio {
            numerator,
            denominator,
        } => {
            let exact = u128::from(bet) * u128::from(numerator) / u128::from(denominator.max(1));
            let payout = u64::try_from(exact).unwrap_or(u64::MAX);
            let kind = if payout > bet {
                OutcomeKind::Win
            } else if payout == 0 {
                OutcomeKind::Loss
            } else {
                OutcomeKind::Neutral
            };
            Resolution { payout, kind }
        }
    }
}

/// Result of a spin
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SpinResult {
    pub segment_index: usize,
    pub label: &'static str,
    pub bet: u64,
    pub payout: u64,
    pub outcome: OutcomeKind,
    pub new_balance: u64,
}

#[derive(Clone)]
pub struct WheelGame {
    ledger: BalanceLedger,
    source: Arc<dyn OutcomeSource>,
}

impl WheelGame {
    pub fn new(ledger: BalanceLedger, source: Arc<dyn OutcomeSource>) -> Self {
        Self { ledger, source }
    }

    /// Spin the wheel for `bet`
    ///
    /// # Errors
    ///
    /// * `BuxError::InvalidArgument` - Bet is zero
    /// * `BuxError::InsufficientFunds` - Bet not covered (no state change)
    pub async fn spin(&self, user_id: &UserId, bet: u64) -> BuxResult<SpinResult> {
        ensure_positive(bet, "bet")?;
        let after_bet = self.ledger.debit(user_id, bet).await?;

        let segment_index = self.source.pick(SEGMENTS.len());
        let segment = &SEGMENTS[segment_index];
        let resolution = resolve(bet, segment);

        let new_balance = match resolution.kind {
            OutcomeKind::Bankrupt => {
                let wiped = self
                    .ledger
                    .retry_policy()
                    .run("bankrupt reset", || self.ledger.reset_to_zero(user_id))
                    .await?;
                log::info!("{user_id} hit bankrupt, {wiped} BUX wiped");
                0
            }
            _ if resolution.payout > 0 => {
                self.ledger
                    .credit_with_retry(user_id, resolution.payout)
                    .await?
            }
            _ => after_bet,
        };

        log::debug!(
            "{user_id} spun {} on a {bet} BUX bet, payout {}",
            segment.label,
            resolution.payout
        );

        Ok(SpinResult {
            segment_index,
            label: segment.label,
            bet,
            payout: resolution.payout,
            outcome: resolution.kind,
            new_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_names_match_wire_format() {
        for kind in [
            OutcomeKind::Win,
            OutcomeKind::Neutral,
            OutcomeKind::Loss,
            OutcomeKind::Bankrupt,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }

    #[test]
    fn test_segment_layout() {
        let labels: Vec<&str> = SEGMENTS.iter().map(|s| s.label).collect();
        assert_eq!(
            labels,
            ["×3", "Lose", "×1.5", "Bankrupt", "×2", "×⅓", "Safe", "Lose"]
        );
    }

    #[test]
    fn test_resolve_payouts() {
        assert_eq!(resolve(100, &SEGMENTS[2]).payout, 150);
        assert_eq!(resolve(10, &SEGMENTS[5]).payout, 3);
        assert_eq!(resolve(10, &SEGMENTS[0]).payout, 30);
        assert_eq!(resolve(7, &SEGMENTS[6]).payout, 7);
    }

    #[test]
    fn test_resolve_kinds() {
        assert_eq!(resolve(100, &SEGMENTS[4]).kind, OutcomeKind::Win);
        assert_eq!(resolve(100, &SEGMENTS[6]).kind, OutcomeKind::Neutral);
        assert_eq!(resolve(100, &SEGMENTS[5]).kind, OutcomeKind::Neutral);
        assert_eq!(resolve(100, &SEGMENTS[1]).kind, OutcomeKind::Loss);
        assert_eq!(resolve(2, &SEGMENTS[5]).kind, OutcomeKind::Loss);
        assert_eq!(resolve(100, &SEGMENTS[3]).kind, OutcomeKind::Bankrupt);
    }

    #[test]
    fn test_resolve_large_bet_does_not_overflow() {
        let resolution = resolve(u64::MAX / 2, &SEGMENTS[0]);
        assert_eq!(resolution.payout, u64::MAX);
        assert_eq!(resolution.kind, OutcomeKind::Win);
    }
}
