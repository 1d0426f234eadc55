// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence interfaces for event-sourced entities.
//!
//! An entity's history lives in an append-only event log keyed by its id; a separate snapshot
//! store bounds replay cost on recovery. Both interfaces are agnostic of the storage engine;
//! this crate ships an in-memory reference implementation.
pub mod memory;
#[cfg(feature = "test_utils")]
pub mod test_utils;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::{EventStore, LocalEventStore, LocalSnapshotStore, SnapshotStore};
