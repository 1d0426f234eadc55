// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store instrumentation for failure-injection tests.
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::memory::MemoryStore;
use crate::traits::{EventStore, SnapshotStore};

/// Error returned by a [`FaultyStore`] in place of a successful write.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("injected store failure")]
pub struct TestStoreError;

/// An in-memory store whose next writes can be made to fail.
///
/// Reads always succeed. Counters for appends and snapshot writes allow asserting how often
/// the store was actually written to.
#[derive(Clone, Debug)]
pub struct FaultyStore<Id, E, S> {
    inner: MemoryStore<Id, E, S>,
    fail_next: Arc<AtomicU64>,
    appends: Arc<AtomicU64>,
    snapshot_puts: Arc<AtomicU64>,
}

impl<Id, E, S> FaultyStore<Id, E, S> {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_next: Arc::new(AtomicU64::new(0)),
            appends: Arc::new(AtomicU64::new(0)),
            snapshot_puts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Make the next `n` writes fail with [`TestStoreError`].
    pub fn fail_next(&self, n: u64) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Number of successful event appends.
    pub fn appends(&self) -> u64 {
        self.appends.load(Ordering::SeqCst)
    }

    /// Number of successful snapshot writes.
    pub fn snapshot_puts(&self) -> u64 {
        self.snapshot_puts.load(Ordering::SeqCst)
    }

    fn inject_failure(&self) -> Result<(), TestStoreError> {
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(TestStoreError);
        }
        Ok(())
    }
}

impl<Id, E, S> Default for FaultyStore<Id, E, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id, E, S> EventStore<Id, E> for FaultyStore<Id, E, S>
where
    Id: Clone + Eq + Hash + Send + Sync,
    E: Clone + Send + Sync,
    S: Clone + Send + Sync,
{
    type Error = TestStoreError;

    async fn append(
        &mut self,
        id: &Id,
        event: &E,
        expected_revision: u64,
    ) -> Result<bool, Self::Error> {
        self.inject_failure()?;
        let appended = self
            .inner
            .append(id, event, expected_revision)
            .await
            .unwrap();
        if appended {
            self.appends.fetch_add(1, Ordering::SeqCst);
        }
        Ok(appended)
    }

    async fn read_from(&self, id: &Id, from_revision: u64) -> Result<Vec<E>, Self::Error> {
        Ok(self.inner.read_from(id, from_revision).await.unwrap())
    }

    async fn latest_revision(&self, id: &Id) -> Result<Option<u64>, Self::Error> {
        Ok(self.inner.latest_revision(id).await.unwrap())
    }
}

impl<Id, E, S> SnapshotStore<Id, S> for FaultyStore<Id, E, S>
where
    Id: Clone + Eq + Hash + Send + Sync,
    E: Clone + Send + Sync,
    S: Clone + Send + Sync,
{
    type Error = TestStoreError;

    async fn put(&mut self, id: &Id, revision: u64, state: &S) -> Result<(), Self::Error> {
        self.inject_failure()?;
        self.inner.put(id, revision, state).await.unwrap();
        self.snapshot_puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn latest(&self, id: &Id) -> Result<Option<(u64, S)>, Self::Error> {
        Ok(self.inner.latest(id).await.unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::{FaultyStore, TestStoreError};
    use crate::traits::EventStore;

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let mut store = FaultyStore::<&'static str, u32, ()>::new();
        store.fail_next(1);

        assert_eq!(store.append(&"a", &1, 0).await, Err(TestStoreError));
        assert!(store.append(&"a", &1, 0).await.unwrap());
        assert_eq!(store.appends(), 1);
    }
}
