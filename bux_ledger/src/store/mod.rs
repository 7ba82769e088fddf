//! Key-addressed store with single-key atomic read-modify-write.
//!
//! Every balance, code, session and heist record lives behind an
//! [`AtomicStore`]. Components never cache records between operations: each
//! mutation goes through [`AtomicStore::atomic_update`], whose transform sees
//! the authoritative current value and answers with a [`Transform`].
//!
//! Two backends are provided:
//! - [`MemoryStore`]: in-process map guarded by a `tokio` `RwLock`
//! - [`PgStore`]: PostgreSQL `kv_store` table using row locks
//!
//! ## Example
//!
//! ```
//! use bux_ledger::store::{AtomicStore, MemoryStore, Transform};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let outcome = store
//!     .atomic_update("counter", &mut |current| {
//!         let n = current.and_then(|v| v.as_u64()).unwrap_or(0);
//!         Transform::Commit(Some(json!(n + 1)))
//!     })
//!     .await?;
//! assert!(outcome.committed);
//! assert_eq!(outcome.value, Some(json!(1)));
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod memory;
pub mod postgres;

pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::errors::{BuxError, BuxResult};

/// Decision returned by an atomic-update transform.
#[derive(Debug)]
pub enum Transform<T = Value> {
    /// Write the new value; `None` deletes the key.
    Commit(Option<T>),
    /// Leave the key untouched and report `committed = false`.
    Abort,
    /// Leave the key untouched and surface the error to the caller.
    Fail(BuxError),
}

/// Result of an atomic update.
///
/// On commit `value` is the new value (`None` when deleted); on abort it is
/// the unchanged current value.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome<T = Value> {
    pub committed: bool,
    pub value: Option<T>,
}

/// Transform closure handed to [`AtomicStore::atomic_update`].
///
/// Backends that retry optimistically may invoke it more than once; it must
/// not have side effects beyond overwriting values it captured.
pub type TransformFn<'a> = dyn FnMut(Option<&Value>) -> Transform + Send + 'a;

#[async_trait]
pub trait AtomicStore: Send + Sync {
    /// Read the current value of `key`.
    async fn read(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Unconditionally write `value`. Not for balance mutations.
    async fn write(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Write every entry atomically: either all keys change or none do.
    async fn batch_write(&self, entries: BTreeMap<String, Value>) -> StoreResult<()>;

    /// Atomically transform the value of `key`.
    ///
    /// Concurrent updates on the same key are linearizable: the transform
    /// always observes the last committed value.
    async fn atomic_update(
        &self,
        key: &str,
        transform: &mut TransformFn<'_>,
    ) -> BuxResult<UpdateOutcome>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Read `key` and decode it as `T`.
pub async fn read_typed<T>(store: &dyn AtomicStore, key: &str) -> BuxResult<Option<T>>
where
    T: DeserializeOwned,
{
    let value = store.read(key).await?;
    let decoded = value
        .map(serde_json::from_value)
        .transpose()
        .map_err(StoreError::Serialization)?;
    Ok(decoded)
}

/// Typed wrapper around [`AtomicStore::atomic_update`].
///
/// The stored JSON is decoded into `T` before `transform` runs and the
/// committed value is encoded back. A record that fails to decode aborts the
/// update with a serialization error instead of being overwritten.
pub async fn update_typed<T, F>(
    store: &dyn AtomicStore,
    key: &str,
    mut transform: F,
) -> BuxResult<UpdateOutcome<T>>
where
    T: Serialize + DeserializeOwned + Send,
    F: FnMut(Option<T>) -> Transform<T> + Send,
{
    let mut adapter = |current: Option<&Value>| -> Transform {
        let decoded = match current.map(|v| T::deserialize(v)).transpose() {
            Ok(decoded) => decoded,
            Err(e) => return Transform::Fail(StoreError::Serialization(e).into()),
        };
        match transform(decoded) {
            Transform::Commit(Some(next)) => match serde_json::to_value(&next) {
                Ok(encoded) => Transform::Commit(Some(encoded)),
                Err(e) => Transform::Fail(StoreError::Serialization(e).into()),
            },
            Transform::Commit(None) => Transform::Commit(None),
            Transform::Abort => Transform::Abort,
            Transform::Fail(e) => Transform::Fail(e),
        }
    };

    let outcome = store.atomic_update(key, &mut adapter).await?;
    let value = outcome
        .value
        .map(serde_json::from_value)
        .transpose()
        .map_err(StoreError::Serialization)?;

    Ok(UpdateOutcome {
        committed: outcome.committed,
        value,
    })
}

/// Store key layout.
pub mod keys {
    use crate::auth::UserId;

    /// Global heist bank status and crew.
    pub const HEIST_BANK: &str = "heist:bank";

    pub fn account(user_id: &UserId) -> String {
        format!("account:{user_id}")
    }

    pub fn code(code: &str) -> String {
        format!("code:{code}")
    }

    pub fn blackjack(user_id: &UserId) -> String {
        format!("blackjack:{user_id}")
    }

    pub fn heist_participant(user_id: &UserId) -> String {
        format!("heist:crew:{user_id}")
    }
}
