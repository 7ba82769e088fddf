//! Balance ledger over the atomic store.

use super::{
    ensure_positive,
    models::{Account, AccountSetup, TransferReceipt},
};
use crate::{
    auth::UserId,
    errors::{BuxError, BuxResult},
    retry::{RetryPolicy, reconciliation_error},
    store::{AtomicStore, Transform, keys, read_typed, update_typed},
};
use std::sync::Arc;

/// Debit/credit/transfer on user balances
#[derive(Clone)]
pub struct BalanceLedger {
    store: Arc<dyn AtomicStore>,
    starting_balance: u64,
    retry: RetryPolicy,
}

impl BalanceLedger {
    /// Create a new ledger
    ///
    /// # Arguments
    ///
    /// * `store` - Shared atomic store
    /// * `starting_balance` - Balance granted by `setup_account`
    /// * `retry` - Policy for credits that must land
    pub fn new(store: Arc<dyn AtomicStore>, starting_balance: u64, retry: RetryPolicy) -> Self {
        Self {
            store,
            starting_balance,
            retry,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Create the caller's account if it does not exist yet
    ///
    /// Idempotent: an existing account is returned unchanged. `created` is
    /// decided by the same atomic update that inserts the account, so exactly
    /// one of any number of concurrent calls sees it set.
    pub async fn setup_account(&self, user_id: &UserId) -> BuxResult<AccountSetup> {
        let starting_balance = self.starting_balance;
        let outcome = update_typed::<Account, _>(
            self.store.as_ref(),
            &keys::account(user_id),
            |current| match current {
                Some(_) => Transform::Abort,
                None => Transform::Commit(Some(Account::new(user_id.clone(), starting_balance))),
            },
        )
        .await?;

        if outcome.committed {
            log::info!("Created account for {user_id} with {starting_balance} BUX");
        }

        let account = outcome
            .value
            .ok_or_else(|| BuxError::Internal(format!("account {user_id} vanished during setup")))?;

        Ok(AccountSetup {
            account,
            created: outcome.committed,
        })
    }

    /// Get the caller's account
    ///
    /// # Errors
    ///
    /// * `BuxError::AccountNotFound` - Account was never set up
    pub async fn get_account(&self, user_id: &UserId) -> BuxResult<Account> {
        read_typed::<Account>(self.store.as_ref(), &keys::account(user_id))
            .await?
            .ok_or_else(|| BuxError::AccountNotFound(user_id.clone()))
    }

    /// Current balance
    pub async fn balance(&self, user_id: &UserId) -> BuxResult<u64> {
        Ok(self.get_account(user_id).await?.balance)
    }

    /// Whether an account exists for `user_id`
    pub async fn exists(&self, user_id: &UserId) -> BuxResult<bool> {
        Ok(self.store.read(&keys::account(user_id)).await?.is_some())
    }

    /// Atomically debit `amount` from `user_id`
    ///
    /// # Arguments
    ///
    /// * `user_id` - Account to debit
    /// * `amount` - Positive amount
    ///
    /// # Returns
    ///
    /// * `BuxResult<u64>` - Balance after the debit
    ///
    /// # Errors
    ///
    /// * `BuxError::InvalidArgument` - Amount is zero
    /// * `BuxError::InsufficientFunds` - Balance too low or no account (nothing written)
    pub async fn debit(&self, user_id: &UserId, amount: u64) -> BuxResult<u64> {
        ensure_positive(amount, "amount")?;

        let outcome = update_typed::<Account, _>(
            self.store.as_ref(),
            &keys::account(user_id),
            |current| match current {
                Some(mut account) if account.balance >= amount => {
                    account.balance -= amount;
                    Transform::Commit(Some(account))
                }
                Some(account) => Transform::Fail(BuxError::InsufficientFunds {
                    available: account.balance,
                    required: amount,
                }),
                None => Transform::Fail(BuxError::InsufficientFunds {
                    available: 0,
                    required: amount,
                }),
            },
        )
        .await?;

        balance_of(user_id, outcome.value)
    }

    /// Atomically credit `amount` to `user_id`
    ///
    /// A missing account is treated as a zero balance and created.
    pub async fn credit(&self, user_id: &UserId, amount: u64) -> BuxResult<u64> {
        let outcome = update_typed::<Account, _>(
            self.store.as_ref(),
            &keys::account(user_id),
            |current| {
                let mut account = current.unwrap_or_else(|| Account::new(user_id.clone(), 0));
                match account.balance.checked_add(amount) {
                    Some(balance) => {
                        account.balance = balance;
                        Transform::Commit(Some(account))
                    }
                    None => Transform::Fail(BuxError::Internal(format!(
                        "credit of {amount} would overflow balance of {user_id}"
                    ))),
                }
            },
        )
        .await?;

        balance_of(user_id, outcome.value)
    }

    /// Credit that must not be dropped
    ///
    /// Retries retryable failures under the ledger's retry policy. When the
    /// budget is exhausted the failure is logged at error level for manual
    /// reconciliation and surfaced as `Internal`.
    pub async fn credit_with_retry(&self, user_id: &UserId, amount: u64) -> BuxResult<u64> {
        let label = format!("credit {amount} BUX to {user_id}");
        match self.retry.run(&label, || self.credit(user_id, amount)).await {
            Ok(balance) => Ok(balance),
            Err(e) => {
                log::error!("RECONCILIATION REQUIRED: {label} failed: {e}");
                Err(reconciliation_error(&label, &e))
            }
        }
    }

    /// Move `amount` from `from` to `to`
    ///
    /// The debit commits strictly before the credit. The credit is retried
    /// until it lands; exhaustion is an `Internal` failure that needs manual
    /// reconciliation.
    ///
    /// # Errors
    ///
    /// * `BuxError::SelfTransfer` - `from == to`
    /// * `BuxError::InvalidArgument` - Amount is zero
    /// * `BuxError::InvalidRecipient` - Recipient has no account
    /// * `BuxError::InsufficientFunds` - Sender balance too low
    pub async fn transfer(
        &self,
        from: &UserId,
        to: &UserId,
        amount: u64,
    ) -> BuxResult<TransferReceipt> {
        if from == to {
            return Err(BuxError::SelfTransfer);
        }
        ensure_positive(amount, "amount")?;
        if !self.exists(to).await? {
            return Err(BuxError::InvalidRecipient(to.clone()));
        }

        let sender_balance = self.debit(from, amount).await?;
        self.credit_with_retry(to, amount).await?;

        log::info!("Transferred {amount} BUX from {from} to {to}");

        Ok(TransferReceipt {
            from: from.clone(),
            to: to.clone(),
            amount,
            sender_balance,
        })
    }

    /// Set the balance to exactly zero
    ///
    /// # Returns
    ///
    /// * `BuxResult<u64>` - Balance wiped out by the reset
    pub async fn reset_to_zero(&self, user_id: &UserId) -> BuxResult<u64> {
        let mut wiped = 0;
        update_typed::<Account, _>(
            self.store.as_ref(),
            &keys::account(user_id),
            |current| match current {
                Some(mut account) => {
                    wiped = account.balance;
                    account.balance = 0;
                    Transform::Commit(Some(account))
                }
                None => Transform::Fail(BuxError::AccountNotFound(user_id.clone())),
            },
        )
        .await?;

        Ok(wiped)
    }
}

fn balance_of(user_id: &UserId, account: Option<Account>) -> BuxResult<u64> {
    account
        .map(|account| account.balance)
        .ok_or_else(|| BuxError::Internal(format!("account {user_id} missing after update")))
}
