// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wakeup bookkeeping for expiring subjects.
//!
//! The schedule keeps one pending wakeup per distinct rounded expiry timestamp across the
//! whole policy; subjects sharing a rounded expiry share a wakeup. Timers themselves live in
//! the actor loop, which sleeps until [`ExpirySchedule::next_wakeup`] and deletes whatever
//! [`ExpirySchedule::due_subjects`] reports at that moment.
use std::collections::BTreeSet;

use pangolin_core::{ExpiryGranularity, Label, Policy, SubjectId, Timestamp};

#[derive(Clone, Debug)]
pub struct ExpirySchedule {
    granularity: ExpiryGranularity,
    wakeups: BTreeSet<Timestamp>,
}

impl ExpirySchedule {
    pub fn new(granularity: ExpiryGranularity) -> Self {
        Self {
            granularity,
            wakeups: BTreeSet::new(),
        }
    }

    /// Recompute the pending wakeup set from the given policy state.
    ///
    /// Deleted or nonexistent policies have no expiring subjects to schedule for.
    pub fn reconcile(&mut self, policy: Option<&Policy>) {
        self.wakeups.clear();

        let Some(policy) = policy.filter(|policy| policy.is_active()) else {
            return;
        };

        for (_, subject) in policy.subjects() {
            if let Some(expiry) = subject.expiry {
                // Stored expiries are rounded when set; rounding here again is a no-op for
                // them and normalizes anything recovered from older state.
                self.wakeups.insert(expiry.round_up_to(self.granularity));
            }
        }
    }

    /// Earliest pending wakeup, if any.
    pub fn next_wakeup(&self) -> Option<Timestamp> {
        self.wakeups.first().copied()
    }

    /// Push the earliest wakeups back to `until`, used to retry after a persistence failure.
    pub fn defer_until(&mut self, until: Timestamp) {
        self.wakeups.retain(|wakeup| *wakeup > until);
        self.wakeups.insert(until);
    }

    /// Every subject of the policy whose expiry has elapsed.
    pub fn due_subjects(policy: Option<&Policy>, now: Timestamp) -> Vec<(Label, SubjectId)> {
        let Some(policy) = policy.filter(|policy| policy.is_active()) else {
            return Vec::new();
        };

        policy
            .subjects()
            .filter(|(_, subject)| subject.expiry.is_some_and(|expiry| expiry <= now))
            .map(|(label, subject)| (label.clone(), subject.id.clone()))
            .collect()
    }
}
