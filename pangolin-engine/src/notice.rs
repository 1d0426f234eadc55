// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pub/sub collaborator interface.
//!
//! Every persisted policy event is published under its derived topic, together with a
//! lightweight policy tag for cache invalidation elsewhere; subject-deletion announcements use
//! the same channel. Delivery is at-least-once from the subscriber's point of view.
use std::convert::Infallible;
use std::fmt::{Debug, Display};

use tokio::sync::broadcast;

use pangolin_core::PolicyId;
use pangolin_proto::Envelope;

/// Default buffer capacity of the broadcast notice channel.
pub const DEFAULT_NOTICE_CAPACITY: usize = 256;

/// A message published by the policy runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    /// A persisted policy event under its derived `policies/events` topic.
    Event { envelope: Envelope },

    /// Cache-invalidation tag: the policy changed, cached derived data is stale.
    Tag { id: PolicyId, revision: u64 },

    /// Announcement that subjects are about to be, or have been, deleted.
    SubjectDeletion { envelope: Envelope },
}

/// Interface for publishing notices.
///
/// Two variants of the trait are provided: one which is thread-safe (implementing `Send`) and
/// one which is purely intended for single-threaded execution contexts.
#[trait_variant::make(NoticePublisher: Send)]
pub trait LocalNoticePublisher: Clone {
    type Error: Display + Debug;

    async fn publish(&self, notice: Notice) -> Result<(), Self::Error>;
}

/// Notice publisher over a tokio broadcast channel.
///
/// Publishing with no live subscribers is not an error; notices are simply dropped.
#[derive(Clone, Debug)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Notice>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_CAPACITY)
    }
}

impl NoticePublisher for BroadcastPublisher {
    type Error = Infallible;

    async fn publish(&self, notice: Notice) -> Result<(), Self::Error> {
        // Send only fails without subscribers, which is fine.
        let _ = self.tx.send(notice);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pangolin_core::PolicyId;

    use super::{BroadcastPublisher, Notice, NoticePublisher};

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let publisher = BroadcastPublisher::default();
        let id = PolicyId::new("org.example", "policy-1").unwrap();

        publisher
            .publish(Notice::Tag { id, revision: 1 })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn subscribers_receive_notices() {
        let publisher = BroadcastPublisher::default();
        let mut rx = publisher.subscribe();
        let id = PolicyId::new("org.example", "policy-1").unwrap();

        publisher
            .publish(Notice::Tag {
                id: id.clone(),
                revision: 3,
            })
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap(), Notice::Tag { id, revision: 3 });
    }
}
