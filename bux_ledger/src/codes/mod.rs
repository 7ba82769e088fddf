//! Single-use value codes.
//!
//! Issuing a code debits the creator first; redeeming flips the code's
//! redeemed marker in one atomic update, so exactly one of any number of
//! concurrent redeemers wins and gets credited.

pub mod models;
pub mod registry;

pub use models::{Redemption, ValueCode};
pub use registry::{CODE_PREFIX, CodeRegistry, generate_code, normalize_code};
