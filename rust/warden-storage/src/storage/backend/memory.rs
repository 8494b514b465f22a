use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::WardenStorageError;

use super::{StorageBackend, TransactionalStorageBackend};

/// Map entries plus the backend-wide edition counter. Editions are taken
/// from a single monotonic sequence so that a delete-then-recreate of the
/// same key can never reproduce an old edition.
struct MemoryStore<Key, Value> {
    entries: HashMap<Key, (Value, u64)>,
    next_edition: u64,
}

impl<Key, Value> Default for MemoryStore<Key, Value> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_edition: 0,
        }
    }
}

/// A trivial implementation of [StorageBackend] - backed by a [HashMap] -
/// where all values are kept in memory and never persisted. Clones share
/// the same underlying store, which makes a fresh instance per test the
/// unit of isolation.
#[derive(Clone, Default)]
pub struct MemoryStorageBackend<Key, Value>
where
    Key: Eq + std::hash::Hash,
    Value: Clone,
{
    store: Arc<RwLock<MemoryStore<Key, Value>>>,
}

#[async_trait]
impl<Key, Value> StorageBackend for MemoryStorageBackend<Key, Value>
where
    Key: Clone + Eq + std::hash::Hash + Send + Sync,
    Value: Clone + Send + Sync,
{
    type Key = Key;
    type Value = Value;
    type Error = WardenStorageError;

    async fn set(&mut self, key: Self::Key, value: Self::Value) -> Result<(), Self::Error> {
        let mut store = self.store.write().await;
        store.next_edition += 1;
        let edition = store.next_edition;
        store.entries.insert(key, (value, edition));
        Ok(())
    }

    async fn get(&self, key: &Self::Key) -> Result<Option<Self::Value>, Self::Error> {
        let store = self.store.read().await;
        Ok(store.entries.get(key).map(|(value, _)| value.clone()))
    }
}

#[async_trait]
impl<Key, Value> TransactionalStorageBackend for MemoryStorageBackend<Key, Value>
where
    Key: Clone + Eq + std::hash::Hash + Send + Sync,
    Value: Clone + Send + Sync,
{
    type Address = Key;
    type Value = Value;
    type Error = WardenStorageError;
    type Edition = u64;

    async fn resolve(
        &self,
        address: &Self::Address,
    ) -> Result<Option<(Self::Value, Self::Edition)>, Self::Error> {
        let store = self.store.read().await;
        Ok(store.entries.get(address).cloned())
    }

    async fn replace(
        &self,
        address: &Self::Address,
        edition: Option<&Self::Edition>,
        content: Option<Self::Value>,
    ) -> Result<Option<Self::Edition>, Self::Error> {
        let mut store = self.store.write().await;

        let current = store.entries.get(address).map(|(_, edition)| *edition);
        if current.as_ref() != edition {
            return Err(WardenStorageError::CasConflict(format!(
                "expected edition {edition:?}, found {current:?}"
            )));
        }

        match content {
            Some(value) => {
                store.next_edition += 1;
                let next = store.next_edition;
                store.entries.insert(address.clone(), (value, next));
                Ok(Some(next))
            }
            None => {
                store.entries.remove(address);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn it_creates_an_entry_only_when_absent() -> Result<()> {
        let backend = MemoryStorageBackend::<Vec<u8>, Vec<u8>>::default();
        let address = b"key".to_vec();

        backend.replace(&address, None, Some(vec![1])).await?;
        let result = backend.replace(&address, None, Some(vec![2])).await;

        assert!(matches!(result, Err(WardenStorageError::CasConflict(_))));

        Ok(())
    }

    #[tokio::test]
    async fn it_rejects_a_stale_edition() -> Result<()> {
        let backend = MemoryStorageBackend::<Vec<u8>, Vec<u8>>::default();
        let address = b"key".to_vec();

        let stale = backend.replace(&address, None, Some(vec![1])).await?;
        let fresh = backend
            .replace(&address, stale.as_ref(), Some(vec![2]))
            .await?;

        let result = backend
            .replace(&address, stale.as_ref(), Some(vec![3]))
            .await;
        assert!(matches!(result, Err(WardenStorageError::CasConflict(_))));

        let accepted = backend
            .replace(&address, fresh.as_ref(), Some(vec![3]))
            .await;
        assert!(accepted.is_ok());

        Ok(())
    }

    #[tokio::test]
    async fn it_never_reissues_an_edition_after_deletion() -> Result<()> {
        let backend = MemoryStorageBackend::<Vec<u8>, Vec<u8>>::default();
        let address = b"key".to_vec();

        let first = backend
            .replace(&address, None, Some(vec![1]))
            .await?
            .expect("creation yields an edition");
        backend.replace(&address, Some(&first), None).await?;

        let second = backend
            .replace(&address, None, Some(vec![2]))
            .await?
            .expect("re-creation yields an edition");

        assert_ne!(first, second);

        Ok(())
    }

    #[tokio::test]
    async fn it_admits_exactly_one_concurrent_creator() -> Result<()> {
        let backend = MemoryStorageBackend::<Vec<u8>, Vec<u8>>::default();
        let address = b"contested".to_vec();

        let mut tasks = tokio::task::JoinSet::new();
        for value in 0..8u8 {
            let backend = backend.clone();
            let address = address.clone();
            tasks.spawn(async move { backend.replace(&address, None, Some(vec![value])).await });
        }

        let mut successes = 0;
        while let Some(result) = tasks.join_next().await {
            if result?.is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);

        Ok(())
    }
}
