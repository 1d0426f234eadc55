// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduling of subject-deletion announcements.
//!
//! Subjects can opt into being announced before their expiry deletes them and again once the
//! deletion has happened. The schedule tracks the pre-expiry announce times and remembers what
//! has already been sent so that reconciling after an unrelated mutation does not re-announce.
use std::collections::{BTreeMap, HashSet};

use pangolin_core::{Policy, Subject, SubjectId, Timestamp};

/// Which announcement of a subject has been published already.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnnouncementTrigger {
    BeforeExpiry,
    WhenDeleted,
}

#[derive(Clone, Debug, Default)]
pub struct AnnouncementSchedule {
    /// Pending announcements keyed by announce time; values carry the expiry the announcement
    /// refers to.
    scheduled: BTreeMap<Timestamp, Vec<(SubjectId, Timestamp)>>,
    sent: HashSet<(SubjectId, AnnouncementTrigger)>,
}

impl AnnouncementSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the pending set from the given policy state.
    ///
    /// Announce times already in the past are returned for immediate publication and marked as
    /// sent. Subjects no longer present in the policy drop out of the sent set so a later
    /// re-addition announces again.
    pub fn reconcile(
        &mut self,
        policy: Option<&Policy>,
        now: Timestamp,
    ) -> Vec<(SubjectId, Timestamp)> {
        self.scheduled.clear();
        let mut immediate = Vec::new();

        let Some(policy) = policy.filter(|policy| policy.is_active()) else {
            self.sent.clear();
            return immediate;
        };

        let mut present: HashSet<&SubjectId> = HashSet::new();
        for (_, subject) in policy.subjects() {
            present.insert(&subject.id);

            let Some(announcement) = &subject.announcement else {
                continue;
            };
            let (Some(before_expiry), Some(expiry)) =
                (announcement.before_expiry, subject.expiry)
            else {
                continue;
            };
            if self
                .sent
                .contains(&(subject.id.clone(), AnnouncementTrigger::BeforeExpiry))
            {
                continue;
            }

            let announce_at = expiry - before_expiry;
            if announce_at <= now {
                self.sent
                    .insert((subject.id.clone(), AnnouncementTrigger::BeforeExpiry));
                immediate.push((subject.id.clone(), expiry));
            } else {
                self.scheduled
                    .entry(announce_at)
                    .or_default()
                    .push((subject.id.clone(), expiry));
            }
        }

        self.sent.retain(|(id, _)| present.contains(id));

        immediate
    }

    /// Earliest pending announce time, if any.
    pub fn next_wakeup(&self) -> Option<Timestamp> {
        self.scheduled.keys().next().copied()
    }

    /// Drain every announcement whose announce time has elapsed and mark it sent.
    pub fn due(&mut self, now: Timestamp) -> Vec<(SubjectId, Timestamp)> {
        let mut due = Vec::new();

        while let Some((&announce_at, _)) = self.scheduled.first_key_value() {
            if announce_at > now {
                break;
            }
            let Some((_, batch)) = self.scheduled.pop_first() else {
                break;
            };
            for (subject_id, expiry) in batch {
                if self
                    .sent
                    .insert((subject_id.clone(), AnnouncementTrigger::BeforeExpiry))
                {
                    due.push((subject_id, expiry));
                }
            }
        }

        due
    }

    /// Subjects among the just-deleted that asked for a deletion announcement.
    ///
    /// Marks them sent so a duplicate deletion of the same subject id in one batch announces
    /// once.
    pub fn deletion_announcements(&mut self, deleted: &[Subject]) -> Vec<SubjectId> {
        deleted
            .iter()
            .filter(|subject| {
                subject
                    .announcement
                    .as_ref()
                    .is_some_and(|announcement| announcement.when_deleted)
            })
            .filter(|subject| {
                self.sent
                    .insert((subject.id.clone(), AnnouncementTrigger::WhenDeleted))
            })
            .map(|subject| subject.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pangolin_core::{
        EffectedPermissions, Label, Permission, Policy, PolicyEntry, PolicyId, Resource,
        ResourceKey, Subject, SubjectAnnouncement, SubjectId, Timestamp,
    };

    use super::AnnouncementSchedule;

    fn announcing_subject(name: &str, expiry: u64, before: u64) -> Subject {
        Subject::new(SubjectId::new("google", name).unwrap())
            .with_expiry(Timestamp::from_secs(expiry))
            .with_announcement(SubjectAnnouncement {
                before_expiry: Some(Duration::from_secs(before)),
                when_deleted: true,
            })
    }

    fn policy_with(subjects: Vec<Subject>) -> Policy {
        let mut entry = PolicyEntry::new()
            .with_subject(Subject::new(SubjectId::new("google", "admin").unwrap()))
            .with_resource(Resource::new(
                ResourceKey::policy_root(),
                EffectedPermissions::granted([Permission::Write]),
            ));
        for subject in subjects {
            entry = entry.with_subject(subject);
        }
        Policy::new(
            PolicyId::new("org.example", "announce").unwrap(),
            [(Label::new("owner").unwrap(), entry)].into(),
        )
    }

    #[test]
    fn future_announcements_are_scheduled() {
        let policy = policy_with(vec![announcing_subject("a", 100, 30)]);
        let mut schedule = AnnouncementSchedule::new();

        let immediate = schedule.reconcile(Some(&policy), Timestamp::from_secs(10));
        assert!(immediate.is_empty());
        assert_eq!(schedule.next_wakeup(), Some(Timestamp::from_secs(70)));

        let due = schedule.due(Timestamp::from_secs(70));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].1, Timestamp::from_secs(100));
        assert_eq!(schedule.next_wakeup(), None);
    }

    #[test]
    fn elapsed_announce_times_publish_immediately_and_only_once() {
        let policy = policy_with(vec![announcing_subject("a", 100, 30)]);
        let mut schedule = AnnouncementSchedule::new();

        let immediate = schedule.reconcile(Some(&policy), Timestamp::from_secs(80));
        assert_eq!(immediate.len(), 1);

        // Reconciling again after an unrelated mutation must not re-announce.
        let immediate = schedule.reconcile(Some(&policy), Timestamp::from_secs(81));
        assert!(immediate.is_empty());
        assert_eq!(schedule.next_wakeup(), None);
    }

    #[test]
    fn removed_subjects_may_announce_again_when_re_added() {
        let policy = policy_with(vec![announcing_subject("a", 100, 30)]);
        let mut schedule = AnnouncementSchedule::new();

        assert_eq!(schedule.reconcile(Some(&policy), Timestamp::from_secs(80)).len(), 1);

        // Subject gone, sent marker dropped.
        let without = policy_with(vec![]);
        schedule.reconcile(Some(&without), Timestamp::from_secs(85));

        assert_eq!(schedule.reconcile(Some(&policy), Timestamp::from_secs(90)).len(), 1);
    }

    #[test]
    fn deletion_announcements_respect_the_opt_in() {
        let mut schedule = AnnouncementSchedule::new();
        let wants = announcing_subject("a", 100, 30);
        let silent = Subject::new(SubjectId::new("google", "b").unwrap())
            .with_expiry(Timestamp::from_secs(100));

        let announced = schedule.deletion_announcements(&[wants.clone(), silent]);
        assert_eq!(announced, vec![wants.id.clone()]);
        assert!(schedule.deletion_announcements(&[wants]).is_empty());
    }
}
