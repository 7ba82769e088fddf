//! Cooperative bank heist.
//!
//! The global bank record (`heist:bank`) is the single serialization point:
//! its `safe -> in_progress` transition admits exactly one heist at a time,
//! and the crew list lives on the same key so joining and settling are
//! single-key atomic updates. Per-user outcome records live under
//! `heist:crew:{id}`.

pub mod coordinator;
pub mod models;

pub use coordinator::HeistCoordinator;
pub use models::{
    BankState, BankStatus, HeistEntry, HeistOutcome, HeistReport, HeistStatus, ParticipantStatus,
    Participation,
};
