//! Chance games settled against the ledger.

pub mod blackjack;
pub mod cards;
pub mod chance;
pub mod wheel;

pub use blackjack::{
    BlackjackEngine, BlackjackSession, HitResult, SessionStatus, SessionView, StandOutcome,
    StandResult,
};
pub use cards::{Card, Deck, Suit, score};
pub use chance::{FixedSource, OutcomeSource, ThreadRngSource};
pub use wheel::{OutcomeKind, SEGMENTS, Segment, SpinResult, WheelGame};
