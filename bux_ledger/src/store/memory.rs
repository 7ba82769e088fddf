//! In-process store backend.

use super::{AtomicStore, StoreResult, Transform, TransformFn, UpdateOutcome};
use crate::errors::BuxResult;
use async_trait::async_trait;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tokio::sync::RwLock;

/// Store backed by a `HashMap` behind a `tokio` `RwLock`.
///
/// Transforms run while the write lock is held, so every update is
/// linearizable. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Keys starting with `prefix`, sorted.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl AtomicStore for MemoryStore {
    async fn read(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> StoreResult<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn batch_write(&self, entries: BTreeMap<String, Value>) -> StoreResult<()> {
        let mut map = self.entries.write().await;
        map.extend(entries);
        Ok(())
    }

    async fn atomic_update(
        &self,
        key: &str,
        transform: &mut TransformFn<'_>,
    ) -> BuxResult<UpdateOutcome> {
        let mut entries = self.entries.write().await;
        let decision = transform(entries.get(key));

        match decision {
            Transform::Commit(Some(next)) => {
                entries.insert(key.to_string(), next.clone());
                Ok(UpdateOutcome {
                    committed: true,
                    value: Some(next),
                })
            }
            Transform::Commit(None) => {
                entries.remove(key);
                Ok(UpdateOutcome {
                    committed: true,
                    value: None,
                })
            }
            Transform::Abort => Ok(UpdateOutcome {
                committed: false,
                value: entries.get(key).cloned(),
            }),
            Transform::Fail(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BuxError;
    use serde_json::json;

    #[tokio::test]
    async fn test_abort_leaves_value_untouched() {
        let store = MemoryStore::new();
        store.write("k", json!(1)).await.unwrap();

        let outcome = store
            .atomic_update("k", &mut |_| Transform::Abort)
            .await
            .unwrap();

        assert!(!outcome.committed);
        assert_eq!(outcome.value, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_commit_none_deletes() {
        let store = MemoryStore::new();
        store.write("k", json!("v")).await.unwrap();

        let outcome = store
            .atomic_update("k", &mut |_| Transform::Commit(None))
            .await
            .unwrap();

        assert!(outcome.committed);
        assert_eq!(outcome.value, None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_fail_propagates_error() {
        let store = MemoryStore::new();

        let err = store
            .atomic_update("k", &mut |_| Transform::Fail(BuxError::SelfTransfer))
            .await
            .unwrap_err();

        assert!(matches!(err, BuxError::SelfTransfer));
        assert_eq!(store.read("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_write_sets_every_key() {
        let store = MemoryStore::new();
        let mut batch = BTreeMap::new();
        batch.insert("a".to_string(), json!(1));
        batch.insert("b".to_string(), json!(2));

        store.batch_write(batch).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(store.keys_with_prefix("").await, vec!["a", "b"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();

        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .atomic_update("n", &mut |current| {
                        let n = current.and_then(Value::as_u64).unwrap_or(0);
                        Transform::Commit(Some(json!(n + 1)))
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.read("n").await.unwrap(), Some(json!(50)));
    }
}
