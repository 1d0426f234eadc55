// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence for event logs and snapshots.
use std::collections::HashMap;
use std::convert::Infallible;
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::traits::{EventStore, SnapshotStore};

#[derive(Clone, Debug)]
pub struct InnerMemoryStore<Id, E, S> {
    events: HashMap<Id, Vec<E>>,
    snapshots: HashMap<Id, (u64, S)>,
}

/// An in-memory store for entity event logs and snapshots.
///
/// `MemoryStore` supports usage in asynchronous and multi-threaded contexts by wrapping an
/// `InnerMemoryStore` with an `RwLock` and `Arc`. Convenience methods are provided to obtain a
/// read- or write-lock on the underlying store. Clones share state, which also serves restart
/// scenarios: a store handle outlives the entities recovered from it.
#[derive(Clone, Debug)]
pub struct MemoryStore<Id, E, S> {
    inner: Arc<RwLock<InnerMemoryStore<Id, E, S>>>,
}

impl<Id, E, S> MemoryStore<Id, E, S> {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        let inner = InnerMemoryStore {
            events: HashMap::new(),
            snapshots: HashMap::new(),
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Obtain a read-lock on the store.
    pub fn read_store(&self) -> RwLockReadGuard<InnerMemoryStore<Id, E, S>> {
        self.inner
            .read()
            .expect("acquire shared read access on store")
    }

    /// Obtain a write-lock on the store.
    pub fn write_store(&self) -> RwLockWriteGuard<InnerMemoryStore<Id, E, S>> {
        self.inner
            .write()
            .expect("acquire exclusive write access on store")
    }
}

impl<Id, E, S> Default for MemoryStore<Id, E, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id, E, S> EventStore<Id, E> for MemoryStore<Id, E, S>
where
    Id: Clone + Eq + Hash + Send + Sync,
    E: Clone + Send + Sync,
    S: Clone + Send + Sync,
{
    type Error = Infallible;

    async fn append(
        &mut self,
        id: &Id,
        event: &E,
        expected_revision: u64,
    ) -> Result<bool, Self::Error> {
        let mut store = self.write_store();

        let log = store.events.entry(id.clone()).or_default();
        if log.len() as u64 != expected_revision {
            return Ok(false);
        }

        log.push(event.clone());
        Ok(true)
    }

    async fn read_from(&self, id: &Id, from_revision: u64) -> Result<Vec<E>, Self::Error> {
        let store = self.read_store();

        let events = store
            .events
            .get(id)
            .map(|log| log.iter().skip(from_revision as usize).cloned().collect())
            .unwrap_or_default();

        Ok(events)
    }

    async fn latest_revision(&self, id: &Id) -> Result<Option<u64>, Self::Error> {
        let store = self.read_store();
        Ok(store.events.get(id).map(|log| log.len() as u64))
    }
}

impl<Id, E, S> SnapshotStore<Id, S> for MemoryStore<Id, E, S>
where
    Id: Clone + Eq + Hash + Send + Sync,
    E: Clone + Send + Sync,
    S: Clone + Send + Sync,
{
    type Error = Infallible;

    async fn put(&mut self, id: &Id, revision: u64, state: &S) -> Result<(), Self::Error> {
        let mut store = self.write_store();
        store.snapshots.insert(id.clone(), (revision, state.clone()));
        Ok(())
    }

    async fn latest(&self, id: &Id) -> Result<Option<(u64, S)>, Self::Error> {
        let store = self.read_store();
        Ok(store.snapshots.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::traits::{EventStore, SnapshotStore};

    type TestStore = MemoryStore<&'static str, u32, String>;

    #[tokio::test]
    async fn append_enforces_expected_revision() {
        let mut store = TestStore::new();

        assert!(store.append(&"a", &1, 0).await.unwrap());
        assert!(store.append(&"a", &2, 1).await.unwrap());

        // Conflicting expectation: nothing is appended.
        assert!(!store.append(&"a", &3, 1).await.unwrap());
        assert_eq!(store.latest_revision(&"a").await.unwrap(), Some(2));
        assert_eq!(store.read_from(&"a", 0).await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn read_from_skips_earlier_revisions() {
        let mut store = TestStore::new();
        for (revision, event) in [1u32, 2, 3].iter().enumerate() {
            assert!(store.append(&"a", event, revision as u64).await.unwrap());
        }

        assert_eq!(store.read_from(&"a", 1).await.unwrap(), vec![2, 3]);
        assert_eq!(store.read_from(&"a", 3).await.unwrap(), Vec::<u32>::new());
        assert_eq!(store.read_from(&"missing", 0).await.unwrap(), Vec::<u32>::new());
    }

    #[tokio::test]
    async fn latest_snapshot_wins() {
        let mut store = TestStore::new();

        assert_eq!(store.latest(&"a").await.unwrap(), None);
        store.put(&"a", 5, &"five".to_owned()).await.unwrap();
        store.put(&"a", 9, &"nine".to_owned()).await.unwrap();

        assert_eq!(
            store.latest(&"a").await.unwrap(),
            Some((9, "nine".to_owned()))
        );
    }

    #[tokio::test]
    async fn clones_share_state() {
        let mut store = TestStore::new();
        let clone = store.clone();

        assert!(store.append(&"a", &1, 0).await.unwrap());
        assert_eq!(clone.latest_revision(&"a").await.unwrap(), Some(1));
    }
}
