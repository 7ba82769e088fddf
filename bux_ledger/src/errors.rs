//! Domain error types shared by every component.

use serde::Serialize;
use thiserror::Error;

use crate::{auth::UserId, store::StoreError};

/// Stable, machine-checkable failure kind.
///
/// Callers may retry on [`ErrorKind::Conflict`]; they must not retry on
/// [`ErrorKind::InsufficientFunds`] or [`ErrorKind::InvalidArgument`] without
/// changing the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    InvalidArgument,
    InsufficientFunds,
    NotFound,
    AlreadyRedeemed,
    SelfTransfer,
    SelfRedeem,
    AlreadyInProgress,
    Conflict,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let repr = match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyRedeemed => "already_redeemed",
            ErrorKind::SelfTransfer => "self_transfer",
            ErrorKind::SelfRedeem => "self_redeem",
            ErrorKind::AlreadyInProgress => "already_in_progress",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{repr}")
    }
}

/// Ledger and game errors
#[derive(Debug, Error)]
pub enum BuxError {
    /// No verified caller identity was supplied
    #[error("Authentication required")]
    Unauthenticated,

    /// Malformed or out-of-range input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Balance too low for the requested debit
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: u64, required: u64 },

    /// Account does not exist
    #[error("Account not found for user {0}")]
    AccountNotFound(UserId),

    /// Transfer recipient does not have an account
    #[error("Recipient {0} does not have an account")]
    InvalidRecipient(UserId),

    /// Value code does not exist
    #[error("Code not found: {0}")]
    CodeNotFound(String),

    /// Value code was already consumed
    #[error("Code {0} has already been redeemed")]
    AlreadyRedeemed(String),

    /// No live blackjack hand for the caller
    #[error("No active blackjack session")]
    NoActiveSession,

    /// Heist operation while the bank is safe
    #[error("No heist is in progress")]
    NoHeistInProgress,

    /// Caller is not part of the current heist crew
    #[error("You are not part of the current heist crew")]
    NotInCrew,

    #[error("Cannot transfer to yourself")]
    SelfTransfer,

    #[error("Cannot redeem a code you created")]
    SelfRedeem,

    /// The bank is already being robbed
    #[error("A heist is already in progress")]
    HeistAlreadyInProgress,

    /// Caller is already in the heist crew
    #[error("You are already part of the heist crew")]
    AlreadyInCrew,

    /// A blackjack hand is still being played
    #[error("A blackjack hand is already in progress")]
    SessionInProgress,

    /// Transaction aborted by a concurrent writer
    #[error("Transaction conflict on {0}")]
    Conflict(String),

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Unexpected failure requiring operator attention
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BuxError {
    /// Stable kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuxError::Unauthenticated => ErrorKind::Unauthenticated,
            BuxError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BuxError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            BuxError::AccountNotFound(_)
            | BuxError::InvalidRecipient(_)
            | BuxError::CodeNotFound(_)
            | BuxError::NoActiveSession
            | BuxError::NoHeistInProgress
            | BuxError::NotInCrew => ErrorKind::NotFound,
            BuxError::AlreadyRedeemed(_) => ErrorKind::AlreadyRedeemed,
            BuxError::SelfTransfer => ErrorKind::SelfTransfer,
            BuxError::SelfRedeem => ErrorKind::SelfRedeem,
            BuxError::HeistAlreadyInProgress
            | BuxError::AlreadyInCrew
            | BuxError::SessionInProgress => ErrorKind::AlreadyInProgress,
            BuxError::Conflict(_) => ErrorKind::Conflict,
            BuxError::Store(StoreError::Contention(_)) => ErrorKind::Conflict,
            BuxError::Store(_) | BuxError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether repeating the same operation may succeed without applying it
    /// twice.
    ///
    /// Serialization failures are deterministic and an unacknowledged commit
    /// may already have landed, so neither is retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            BuxError::Conflict(_) => true,
            BuxError::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Storage errors are sanitized so that SQL details and connection
    /// strings never reach a client.
    pub fn client_message(&self) -> String {
        match self {
            BuxError::Store(StoreError::Contention(_)) => {
                "Concurrent update, please retry".to_string()
            }
            BuxError::Store(_) | BuxError::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger and game operations
pub type BuxResult<T> = Result<T, BuxError>;
