//! Code issuance and redemption.

use super::models::{Redemption, ValueCode};
use crate::{
    auth::UserId,
    errors::{BuxError, BuxResult},
    ledger::{BalanceLedger, ensure_positive},
    store::{AtomicStore, Transform, keys, read_typed, update_typed},
};
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;

/// Prefix of every value code
pub const CODE_PREFIX: &str = "LBX-";

/// Length of the random part of generated codes
pub const GENERATED_CODE_LEN: usize = 8;

/// Accepted length range of the random part
const MIN_CODE_LEN: usize = 6;
const MAX_CODE_LEN: usize = 8;

/// Fresh codes tried before giving up on an issue
const MAX_GENERATION_ATTEMPTS: u32 = 5;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate an unpredictable code such as `LBX-7QK2M9XA`.
///
/// Uses the thread-local generator, which is a CSPRNG seeded from the OS.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    let body: String = (0..GENERATED_CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect();
    format!("{CODE_PREFIX}{body}")
}

/// Trim and upper-case user input, then check the code format.
///
/// # Errors
///
/// * `BuxError::InvalidArgument` - Not `LBX-` followed by 6-8 alphanumerics
pub fn normalize_code(input: &str) -> BuxResult<String> {
    let code = input.trim().to_ascii_uppercase();
    let body = code
        .strip_prefix(CODE_PREFIX)
        .ok_or_else(|| BuxError::InvalidArgument(format!("code must start with {CODE_PREFIX}")))?;

    if !(MIN_CODE_LEN..=MAX_CODE_LEN).contains(&body.len())
        || !body.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(BuxError::InvalidArgument(format!(
            "code must be {CODE_PREFIX} followed by {MIN_CODE_LEN}-{MAX_CODE_LEN} letters or digits"
        )));
    }

    Ok(code)
}

/// Issues and redeems value codes
#[derive(Clone)]
pub struct CodeRegistry {
    store: Arc<dyn AtomicStore>,
    ledger: BalanceLedger,
    generator: fn() -> String,
}

impl CodeRegistry {
    pub fn new(store: Arc<dyn AtomicStore>, ledger: BalanceLedger) -> Self {
        Self {
            store,
            ledger,
            generator: generate_code,
        }
    }

    /// Replace the code generator
    pub fn with_generator(mut self, generator: fn() -> String) -> Self {
        self.generator = generator;
        self
    }

    /// Issue a code worth `amount`, paid for by `creator`
    ///
    /// The creator is debited first; nothing is written if that fails. If no
    /// unique code can be stored, the debit is refunded.
    ///
    /// # Errors
    ///
    /// * `BuxError::InvalidArgument` - Amount is zero
    /// * `BuxError::InsufficientFunds` - Creator cannot cover the amount
    pub async fn issue(&self, creator: &UserId, amount: u64) -> BuxResult<ValueCode> {
        ensure_positive(amount, "amount")?;
        self.ledger.debit(creator, amount).await?;

        match self.store_new_code(creator, amount).await {
            Ok(code) => {
                log::info!("{creator} issued code {} worth {amount} BUX", code.code);
                Ok(code)
            }
            Err(e) => {
                log::warn!("Refunding {amount} BUX to {creator} after failed code issue: {e}");
                self.ledger.credit_with_retry(creator, amount).await?;
                Err(e)
            }
        }
    }

    async fn store_new_code(&self, creator: &UserId, amount: u64) -> BuxResult<ValueCode> {
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            let record = ValueCode {
                code: (self.generator)(),
                amount,
                creator_id: creator.clone(),
                created_at: Utc::now(),
                redeemed_by: None,
                redeemed_at: None,
            };

            let outcome = update_typed::<ValueCode, _>(
                self.store.as_ref(),
                &keys::code(&record.code),
                |current| match current {
                    Some(_) => Transform::Abort,
                    None => Transform::Commit(Some(record.clone())),
                },
            )
            .await?;

            if outcome.committed {
                return Ok(record);
            }
            log::debug!("Code collision on {}, regenerating", record.code);
        }

        Err(BuxError::Internal(
            "could not generate a unique value code".to_string(),
        ))
    }

    /// Redeem `code` for `user`
    ///
    /// Marks the code redeemed in one atomic update, then credits the
    /// redeemer (retried until it lands).
    ///
    /// # Errors
    ///
    /// * `BuxError::InvalidArgument` - Malformed code
    /// * `BuxError::CodeNotFound` - Unknown code
    /// * `BuxError::SelfRedeem` - Caller created the code
    /// * `BuxError::AlreadyRedeemed` - Someone got there first
    pub async fn redeem(&self, user: &UserId, code: &str) -> BuxResult<Redemption> {
        let code = normalize_code(code)?;
        let now = Utc::now();

        let outcome = update_typed::<ValueCode, _>(
            self.store.as_ref(),
            &keys::code(&code),
            |current| match current {
                None => Transform::Fail(BuxError::CodeNotFound(code.clone())),
                Some(record) if &record.creator_id == user => Transform::Fail(BuxError::SelfRedeem),
                Some(record) if record.is_redeemed() => {
                    Transform::Fail(BuxError::AlreadyRedeemed(code.clone()))
                }
                Some(mut record) => {
                    record.redeemed_by = Some(user.clone());
                    record.redeemed_at = Some(now);
                    Transform::Commit(Some(record))
                }
            },
        )
        .await?;

        let amount = outcome
            .value
            .map(|record| record.amount)
            .ok_or_else(|| BuxError::Internal(format!("code {code} missing after redeem")))?;

        let new_balance = self.ledger.credit_with_retry(user, amount).await?;
        log::info!("{user} redeemed code {code} for {amount} BUX");

        Ok(Redemption {
            code,
            amount,
            new_balance,
        })
    }

    /// Look up a code without consuming it
    pub async fn lookup(&self, code: &str) -> BuxResult<ValueCode> {
        let code = normalize_code(code)?;
        read_typed::<ValueCode>(self.store.as_ref(), &keys::code(&code))
            .await?
            .ok_or(BuxError::CodeNotFound(code))
    }
}
