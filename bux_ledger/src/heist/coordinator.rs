//! Heist state machine over the bank record.

use super::models::{
    BankState, BankStatus, HeistEntry, HeistOutcome, HeistReport, HeistStatus, ParticipantStatus,
    Participation,
};
use crate::{
    auth::UserId,
    config::HeistConfig,
    errors::{BuxError, BuxResult},
    game::chance::OutcomeSource,
    ledger::BalanceLedger,
    retry::reconciliation_error,
    store::{AtomicStore, Transform, keys, read_typed, update_typed},
};
use chrono::Utc;
use std::{collections::BTreeMap, sync::Arc};

/// A `playing` record and the one it replaced
struct PendingRecord {
    written: Participation,
    previous: Option<Participation>,
}

#[derive(Clone)]
pub struct HeistCoordinator {
    store: Arc<dyn AtomicStore>,
    ledger: BalanceLedger,
    config: HeistConfig,
    source: Arc<dyn OutcomeSource>,
}

impl HeistCoordinator {
    /// Create a new coordinator
    ///
    /// # Arguments
    ///
    /// * `store` - Shared atomic store
    /// * `ledger` - Ledger used for entry costs and payouts
    /// * `config` - Entry cost, success chance and payout multiplier
    /// * `source` - Draws the crew's fate
    pub fn new(
        store: Arc<dyn AtomicStore>,
        ledger: BalanceLedger,
        config: HeistConfig,
        source: Arc<dyn OutcomeSource>,
    ) -> Self {
        Self {
            store,
            ledger,
            config,
            source,
        }
    }

    pub fn config(&self) -> HeistConfig {
        self.config
    }

    /// Write the initial safe bank record if none exists
    pub async fn initialize(&self) -> BuxResult<()> {
        if self.store.read(keys::HEIST_BANK).await?.is_some() {
            return Ok(());
        }

        let mut initial = BTreeMap::new();
        initial.insert(
            keys::HEIST_BANK.to_string(),
            serde_json::to_value(BankState::safe()).map_err(crate::store::StoreError::from)?,
        );
        self.store.batch_write(initial).await?;

        log::info!("Initialized heist bank state");
        Ok(())
    }

    /// Start a heist with `user_id` as the first crew member
    ///
    /// The starter's `playing` record is written first, then the bank
    /// transitions `safe -> in_progress`, and only then is the entry cost
    /// debited. If the debit fails the starter is taken off the crew again,
    /// which returns the bank to `safe` unless others joined.
    ///
    /// # Errors
    ///
    /// * `BuxError::HeistAlreadyInProgress` - Another heist is running
    /// * `BuxError::InsufficientFunds` - Entry cost not covered
    pub async fn start(&self, user_id: &UserId) -> BuxResult<HeistEntry> {
        let pending = self.record_playing(user_id).await?;

        let now = Utc::now();
        let started = update_typed::<BankState, _>(self.store.as_ref(), keys::HEIST_BANK, |current| {
            match current.unwrap_or_default() {
                bank if bank.is_in_progress() => Transform::Fail(BuxError::HeistAlreadyInProgress),
                _ => Transform::Commit(Some(BankState {
                    status: BankStatus::InProgress,
                    crew: vec![user_id.clone()],
                    started_at: Some(now),
                })),
            }
        })
        .await;
        if let Err(e) = started {
            self.restore_record(user_id, &pending).await;
            return Err(e);
        }

        let new_balance = match self.ledger.debit(user_id, self.config.entry_cost).await {
            Ok(balance) => balance,
            Err(e) => {
                self.release_member(user_id, "heist start rollback").await?;
                self.restore_record(user_id, &pending).await;
                return Err(e);
            }
        };

        // Others may have joined while the entry cost was being debited
        let crew_size = self
            .bank()
            .await
            .ok()
            .filter(|bank| bank.has_member(user_id))
            .map_or(1, |bank| bank.crew.len());
        log::info!("{user_id} started a heist");

        Ok(HeistEntry {
            entry_cost: self.config.entry_cost,
            new_balance,
            crew_size,
        })
    }

    /// Join the running heist
    ///
    /// The entry cost is debited and the `playing` record written before the
    /// user is added to the crew. A settle can only see members already on
    /// the crew, so its final record always lands after ours. Both steps are
    /// undone if the heist ended in between.
    ///
    /// # Errors
    ///
    /// * `BuxError::NoHeistInProgress` - Bank is safe
    /// * `BuxError::AlreadyInCrew` - Caller already joined
    /// * `BuxError::InsufficientFunds` - Entry cost not covered
    pub async fn join(&self, user_id: &UserId) -> BuxResult<HeistEntry> {
        let bank = self.bank().await?;
        if !bank.is_in_progress() {
            return Err(BuxError::NoHeistInProgress);
        }
        if bank.has_member(user_id) {
            return Err(BuxError::AlreadyInCrew);
        }

        let new_balance = self.ledger.debit(user_id, self.config.entry_cost).await?;

        let pending = match self.record_playing(user_id).await {
            Ok(pending) => pending,
            Err(e) => {
                self.ledger
                    .credit_with_retry(user_id, self.config.entry_cost)
                    .await?;
                return Err(e);
            }
        };

        let joined = update_typed::<BankState, _>(self.store.as_ref(), keys::HEIST_BANK, |current| {
            match current {
                Some(bank) if !bank.is_in_progress() => {
                    Transform::Fail(BuxError::NoHeistInProgress)
                }
                Some(bank) if bank.has_member(user_id) => Transform::Fail(BuxError::AlreadyInCrew),
                Some(mut bank) => {
                    bank.crew.push(user_id.clone());
                    Transform::Commit(Some(bank))
                }
                None => Transform::Fail(BuxError::NoHeistInProgress),
            }
        })
        .await;

        let crew_size = match joined {
            Ok(outcome) => outcome.value.map(|bank| bank.crew.len()).unwrap_or_default(),
            Err(e) => {
                self.restore_record(user_id, &pending).await;
                self.ledger
                    .credit_with_retry(user_id, self.config.entry_cost)
                    .await?;
                return Err(e);
            }
        };

        log::info!("{user_id} joined the heist ({crew_size} in crew)");

        Ok(HeistEntry {
            entry_cost: self.config.entry_cost,
            new_balance,
            crew_size,
        })
    }

    /// End the running heist and pay out
    ///
    /// One draw decides the whole crew. Escaped members are each credited
    /// `entry_cost * payout_multiplier`; every member's record is rewritten
    /// in one batch.
    ///
    /// # Errors
    ///
    /// * `BuxError::NoHeistInProgress` - Bank is safe
    /// * `BuxError::NotInCrew` - Caller is not a member
    pub async fn settle(&self, user_id: &UserId) -> BuxResult<HeistReport> {
        let payout_each = self.config.payout().ok_or_else(|| {
            BuxError::Internal("heist payout overflows the amount type".to_string())
        })?;

        let mut crew = Vec::new();
        update_typed::<BankState, _>(self.store.as_ref(), keys::HEIST_BANK, |current| {
            match current {
                Some(bank) if bank.is_in_progress() && bank.has_member(user_id) => {
                    crew = bank.crew;
                    Transform::Commit(Some(BankState::safe()))
                }
                Some(bank) if bank.is_in_progress() => Transform::Fail(BuxError::NotInCrew),
                _ => Transform::Fail(BuxError::NoHeistInProgress),
            }
        })
        .await?;

        let escaped = self.source.pick(100) < usize::from(self.config.success_percent);
        let (outcome, payout_each) = if escaped {
            (HeistOutcome::Escaped, payout_each)
        } else {
            (HeistOutcome::Caught, 0)
        };

        let mut first_error = None;
        if payout_each > 0 {
            for member in &crew {
                if let Err(e) = self.ledger.credit_with_retry(member, payout_each).await {
                    first_error.get_or_insert(e);
                }
            }
        }

        let status = match outcome {
            HeistOutcome::Escaped => ParticipantStatus::Escaped,
            HeistOutcome::Caught => ParticipantStatus::Caught,
        };
        let now = Utc::now();
        let mut records = BTreeMap::new();
        for member in &crew {
            let record = Participation {
                status,
                payout: payout_each,
                updated_at: now,
            };
            records.insert(
                keys::heist_participant(member),
                serde_json::to_value(record).map_err(crate::store::StoreError::from)?,
            );
        }
        self.store.batch_write(records).await?;

        log::info!(
            "Heist settled by {user_id}: {} crew {outcome:?}, {payout_each} BUX each",
            crew.len()
        );

        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(HeistReport {
            outcome,
            crew,
            payout_each,
        })
    }

    /// Bank state and the caller's latest participation
    pub async fn status(&self, user_id: &UserId) -> BuxResult<HeistStatus> {
        let bank = self.bank().await?;
        let participation =
            read_typed::<Participation>(self.store.as_ref(), &keys::heist_participant(user_id))
                .await?;

        Ok(HeistStatus {
            bank_status: bank.status,
            crew_size: bank.crew.len(),
            entry_cost: self.config.entry_cost,
            participation,
        })
    }

    async fn bank(&self) -> BuxResult<BankState> {
        Ok(read_typed::<BankState>(self.store.as_ref(), keys::HEIST_BANK)
            .await?
            .unwrap_or_default())
    }

    /// Mark `user_id` as playing, remembering the record it replaced
    async fn record_playing(&self, user_id: &UserId) -> BuxResult<PendingRecord> {
        let written = Participation::playing();
        let mut previous = None;
        update_typed::<Participation, _>(
            self.store.as_ref(),
            &keys::heist_participant(user_id),
            |current| {
                previous = current;
                Transform::Commit(Some(written.clone()))
            },
        )
        .await?;

        Ok(PendingRecord { written, previous })
    }

    /// Put back the record `record_playing` replaced, unless something has
    /// written over ours since. Failure is only logged.
    async fn restore_record(&self, user_id: &UserId, pending: &PendingRecord) {
        let result = self
            .ledger
            .retry_policy()
            .run("heist record restore", || {
                self.restore_if_unchanged(user_id, pending)
            })
            .await;

        if let Err(e) = result {
            log::warn!("Could not restore heist record for {user_id}: {e}");
        }
    }

    async fn restore_if_unchanged(
        &self,
        user_id: &UserId,
        pending: &PendingRecord,
    ) -> BuxResult<()> {
        update_typed::<Participation, _>(
            self.store.as_ref(),
            &keys::heist_participant(user_id),
            |current| {
                if current.as_ref() == Some(&pending.written) {
                    Transform::Commit(pending.previous.clone())
                } else {
                    Transform::Abort
                }
            },
        )
        .await?;
        Ok(())
    }

    /// Take `user_id` off the crew, retried. An emptied crew makes the bank
    /// safe again.
    async fn release_member(&self, user_id: &UserId, label: &str) -> BuxResult<()> {
        let result = self
            .ledger
            .retry_policy()
            .run(label, || self.remove_from_crew(user_id))
            .await;

        result.map_err(|e| {
            log::error!("RECONCILIATION REQUIRED: {label} for {user_id} failed: {e}");
            reconciliation_error(label, &e)
        })
    }

    async fn remove_from_crew(&self, user_id: &UserId) -> BuxResult<()> {
        update_typed::<BankState, _>(self.store.as_ref(), keys::HEIST_BANK, |current| {
            match current {
                Some(mut bank) if bank.is_in_progress() && bank.has_member(user_id) => {
                    bank.crew.retain(|member| member != user_id);
                    if bank.crew.is_empty() {
                        Transform::Commit(Some(BankState::safe()))
                    } else {
                        Transform::Commit(Some(bank))
                    }
                }
                _ => Transform::Abort,
            }
        })
        .await?;
        Ok(())
    }
}
