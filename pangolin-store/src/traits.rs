// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for event logs and snapshot stores.
use std::fmt::{Debug, Display};

/// Interface for an append-only event log keyed by entity id.
///
/// Events are numbered by revision starting at 1; an event at revision `r` is appended with
/// `expected_revision = r - 1`. Two variants of the trait are provided: one which is
/// thread-safe (implementing `Send`) and one which is purely intended for single-threaded
/// execution contexts.
#[trait_variant::make(EventStore: Send)]
pub trait LocalEventStore<Id, E>: Clone {
    type Error: Display + Debug;

    /// Append an event with optimistic concurrency control.
    ///
    /// Returns `true` when the append occurred, or `false` when `expected_revision` did not
    /// match the latest revision of the log and nothing was appended.
    async fn append(
        &mut self,
        id: &Id,
        event: &E,
        expected_revision: u64,
    ) -> Result<bool, Self::Error>;

    /// Get all events with a revision greater than `from_revision`, in revision order.
    ///
    /// Returns an empty vector for an unknown entity.
    async fn read_from(&self, id: &Id, from_revision: u64) -> Result<Vec<E>, Self::Error>;

    /// Get the latest revision of an entity's log.
    ///
    /// Returns `None` when no event was ever appended for the entity.
    async fn latest_revision(&self, id: &Id) -> Result<Option<u64>, Self::Error>;
}

/// Interface for a snapshot store keyed by entity id.
///
/// A snapshot is the full serialized state of an entity at a given revision; only the latest
/// snapshot per entity needs to be retained. Two variants of the trait are provided, as for
/// the event log.
#[trait_variant::make(SnapshotStore: Send)]
pub trait LocalSnapshotStore<Id, S>: Clone {
    type Error: Display + Debug;

    /// Store a snapshot of an entity at the given revision, replacing any earlier one.
    async fn put(&mut self, id: &Id, revision: u64, state: &S) -> Result<(), Self::Error>;

    /// Get the latest snapshot of an entity with its revision.
    async fn latest(&self, id: &Id) -> Result<Option<(u64, S)>, Self::Error>;
}
