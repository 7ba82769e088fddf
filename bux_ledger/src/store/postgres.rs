//! PostgreSQL store backend.
#![allow(clippy::needless_raw_string_hashes)]

use super::{AtomicStore, StoreError, StoreResult, Transform, TransformFn, UpdateOutcome};
use crate::{
    db::timeouts::{with_default_timeout, with_transaction_timeout},
    errors::BuxResult,
};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::{collections::BTreeMap, sync::Arc};

/// Schema for the key-value table.
pub const SCHEMA: &str = include_str!("../../migrations/0001_kv_store.sql");

/// Default number of attempts when a first insert races another writer.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Store backed by the `kv_store` table.
///
/// Existing keys are updated under `SELECT ... FOR UPDATE`. A key that does
/// not exist yet cannot be row-locked, so the first write uses
/// `INSERT ... ON CONFLICT DO NOTHING`; losing that race re-runs the
/// transform against the winner's value.
#[derive(Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
    max_attempts: u32,
}

impl PgStore {
    /// Create a new store over an existing pool
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the insert-race attempt limit
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Create the `kv_store` table if it does not exist
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        with_default_timeout(sqlx::query(SCHEMA).execute(self.pool.as_ref())).await?;
        Ok(())
    }
}

/// Commit `tx`. Any failure at this point leaves the outcome unknown.
async fn commit(tx: Transaction<'_, Postgres>, key: &str) -> StoreResult<()> {
    with_transaction_timeout(tx.commit())
        .await
        .map_err(|e| StoreError::CommitUnknown {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl AtomicStore for PgStore {
    async fn read(&self, key: &str) -> StoreResult<Option<Value>> {
        let row = with_default_timeout(
            sqlx::query("SELECT value FROM kv_store WHERE key = $1")
                .bind(key)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        Ok(row.map(|r| r.get::<Value, _>("value")))
    }

    async fn write(&self, key: &str, value: Value) -> StoreResult<()> {
        with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO kv_store (key, value, updated_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (key)
                DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                "#,
            )
            .bind(key)
            .bind(&value)
            .execute(self.pool.as_ref()),
        )
        .await?;

        Ok(())
    }

    async fn batch_write(&self, entries: BTreeMap<String, Value>) -> StoreResult<()> {
        let mut tx = with_transaction_timeout(self.pool.begin()).await?;

        for (key, value) in &entries {
            with_default_timeout(
                sqlx::query(
                    r#"
                    INSERT INTO kv_store (key, value, updated_at)
                    VALUES ($1, $2, NOW())
                    ON CONFLICT (key)
                    DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                    "#,
                )
                .bind(key)
                .bind(value)
                .execute(&mut *tx),
            )
            .await?;
        }

        let label = entries.keys().next().map_or("<empty batch>", String::as_str);
        commit(tx, label).await
    }

    async fn atomic_update(
        &self,
        key: &str,
        transform: &mut TransformFn<'_>,
    ) -> BuxResult<UpdateOutcome> {
        for attempt in 1..=self.max_attempts {
            let mut tx = with_transaction_timeout(self.pool.begin()).await?;

            // Lock the row so concurrent updates on this key serialize
            let current: Option<Value> = with_default_timeout(
                sqlx::query("SELECT value FROM kv_store WHERE key = $1 FOR UPDATE")
                    .bind(key)
                    .fetch_optional(&mut *tx),
            )
            .await?
            .map(|row| row.get("value"));

            match transform(current.as_ref()) {
                Transform::Abort => {
                    with_transaction_timeout(tx.rollback()).await?;
                    return Ok(UpdateOutcome {
                        committed: false,
                        value: current,
                    });
                }
                Transform::Fail(e) => {
                    with_transaction_timeout(tx.rollback()).await?;
                    return Err(e);
                }
                Transform::Commit(None) => {
                    if current.is_some() {
                        with_default_timeout(
                            sqlx::query("DELETE FROM kv_store WHERE key = $1")
                                .bind(key)
                                .execute(&mut *tx),
                        )
                        .await?;
                    }
                    commit(tx, key).await?;
                    return Ok(UpdateOutcome {
                        committed: true,
                        value: None,
                    });
                }
                Transform::Commit(Some(next)) => {
                    if current.is_some() {
                        with_default_timeout(
                            sqlx::query(
                                "UPDATE kv_store SET value = $2, updated_at = NOW() WHERE key = $1",
                            )
                            .bind(key)
                            .bind(&next)
                            .execute(&mut *tx),
                        )
                        .await?;
                    } else {
                        let inserted = with_default_timeout(
                            sqlx::query(
                                r#"
                                INSERT INTO kv_store (key, value, updated_at)
                                VALUES ($1, $2, NOW())
                                ON CONFLICT (key) DO NOTHING
                                RETURNING key
                                "#,
                            )
                            .bind(key)
                            .bind(&next)
                            .fetch_optional(&mut *tx),
                        )
                        .await?;

                        if inserted.is_none() {
                            // Another writer created the key first
                            with_transaction_timeout(tx.rollback()).await?;
                            log::debug!("Insert race on {key} (attempt {attempt}), retrying");
                            continue;
                        }
                    }

                    commit(tx, key).await?;
                    return Ok(UpdateOutcome {
                        committed: true,
                        value: Some(next),
                    });
                }
            }
        }

        Err(StoreError::Contention(key.to_string()).into())
    }

    async fn health_check(&self) -> StoreResult<()> {
        with_default_timeout(sqlx::query("SELECT 1").execute(self.pool.as_ref())).await?;
        Ok(())
    }
}
