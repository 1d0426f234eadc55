// SPDX-License-Identifier: MIT OR Apache-2.0

//! The closed set of policy events and their deterministic application.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entry::{Label, PolicyEntry};
use crate::id::PolicyId;
use crate::policy::{Lifecycle, Policy};
use crate::resource::{Resource, ResourceKey};
use crate::subject::{Subject, SubjectId};
use crate::timestamp::Timestamp;

/// A persisted fact about a policy entity.
///
/// Every event carries the revision it moves the aggregate to and the wall-clock time of its
/// acceptance, plus enough payload to reconstruct the mutation idempotently. Events are
/// append-only; once persisted they are never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyEvent {
    Created {
        id: PolicyId,
        entries: BTreeMap<Label, PolicyEntry>,
        revision: u64,
        timestamp: Timestamp,
    },
    Modified {
        id: PolicyId,
        entries: BTreeMap<Label, PolicyEntry>,
        revision: u64,
        timestamp: Timestamp,
    },
    Deleted {
        id: PolicyId,
        revision: u64,
        timestamp: Timestamp,
    },
    EntryCreated {
        id: PolicyId,
        label: Label,
        entry: PolicyEntry,
        revision: u64,
        timestamp: Timestamp,
    },
    EntryModified {
        id: PolicyId,
        label: Label,
        entry: PolicyEntry,
        revision: u64,
        timestamp: Timestamp,
    },
    EntryDeleted {
        id: PolicyId,
        label: Label,
        revision: u64,
        timestamp: Timestamp,
    },
    SubjectCreated {
        id: PolicyId,
        label: Label,
        subject: Subject,
        revision: u64,
        timestamp: Timestamp,
    },
    SubjectModified {
        id: PolicyId,
        label: Label,
        subject: Subject,
        revision: u64,
        timestamp: Timestamp,
    },
    SubjectsModified {
        id: PolicyId,
        label: Label,
        subjects: BTreeMap<SubjectId, Subject>,
        revision: u64,
        timestamp: Timestamp,
    },
    SubjectDeleted {
        id: PolicyId,
        label: Label,
        subject_id: SubjectId,
        revision: u64,
        timestamp: Timestamp,
    },
    ResourceCreated {
        id: PolicyId,
        label: Label,
        resource: Resource,
        revision: u64,
        timestamp: Timestamp,
    },
    ResourceModified {
        id: PolicyId,
        label: Label,
        resource: Resource,
        revision: u64,
        timestamp: Timestamp,
    },
    ResourceDeleted {
        id: PolicyId,
        label: Label,
        key: ResourceKey,
        revision: u64,
        timestamp: Timestamp,
    },
}

impl PolicyEvent {
    /// The policy entity this event belongs to.
    pub fn policy_id(&self) -> &PolicyId {
        match self {
            PolicyEvent::Created { id, .. }
            | PolicyEvent::Modified { id, .. }
            | PolicyEvent::Deleted { id, .. }
            | PolicyEvent::EntryCreated { id, .. }
            | PolicyEvent::EntryModified { id, .. }
            | PolicyEvent::EntryDeleted { id, .. }
            | PolicyEvent::SubjectCreated { id, .. }
            | PolicyEvent::SubjectModified { id, .. }
            | PolicyEvent::SubjectsModified { id, .. }
            | PolicyEvent::SubjectDeleted { id, .. }
            | PolicyEvent::ResourceCreated { id, .. }
            | PolicyEvent::ResourceModified { id, .. }
            | PolicyEvent::ResourceDeleted { id, .. } => id,
        }
    }

    /// Revision this event moves the aggregate to.
    pub fn revision(&self) -> u64 {
        match self {
            PolicyEvent::Created { revision, .. }
            | PolicyEvent::Modified { revision, .. }
            | PolicyEvent::Deleted { revision, .. }
            | PolicyEvent::EntryCreated { revision, .. }
            | PolicyEvent::EntryModified { revision, .. }
            | PolicyEvent::EntryDeleted { revision, .. }
            | PolicyEvent::SubjectCreated { revision, .. }
            | PolicyEvent::SubjectModified { revision, .. }
            | PolicyEvent::SubjectsModified { revision, .. }
            | PolicyEvent::SubjectDeleted { revision, .. }
            | PolicyEvent::ResourceCreated { revision, .. }
            | PolicyEvent::ResourceModified { revision, .. }
            | PolicyEvent::ResourceDeleted { revision, .. } => *revision,
        }
    }

    /// Wall-clock time of the event's acceptance.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            PolicyEvent::Created { timestamp, .. }
            | PolicyEvent::Modified { timestamp, .. }
            | PolicyEvent::Deleted { timestamp, .. }
            | PolicyEvent::EntryCreated { timestamp, .. }
            | PolicyEvent::EntryModified { timestamp, .. }
            | PolicyEvent::EntryDeleted { timestamp, .. }
            | PolicyEvent::SubjectCreated { timestamp, .. }
            | PolicyEvent::SubjectModified { timestamp, .. }
            | PolicyEvent::SubjectsModified { timestamp, .. }
            | PolicyEvent::SubjectDeleted { timestamp, .. }
            | PolicyEvent::ResourceCreated { timestamp, .. }
            | PolicyEvent::ResourceModified { timestamp, .. }
            | PolicyEvent::ResourceDeleted { timestamp, .. } => *timestamp,
        }
    }

    /// The topic-path event action this event is published under.
    pub fn name(&self) -> &'static str {
        match self {
            PolicyEvent::Created { .. }
            | PolicyEvent::EntryCreated { .. }
            | PolicyEvent::SubjectCreated { .. }
            | PolicyEvent::ResourceCreated { .. } => "created",
            PolicyEvent::Modified { .. }
            | PolicyEvent::EntryModified { .. }
            | PolicyEvent::SubjectModified { .. }
            | PolicyEvent::SubjectsModified { .. }
            | PolicyEvent::ResourceModified { .. } => "modified",
            PolicyEvent::Deleted { .. }
            | PolicyEvent::EntryDeleted { .. }
            | PolicyEvent::SubjectDeleted { .. }
            | PolicyEvent::ResourceDeleted { .. } => "deleted",
        }
    }

    /// JSON-pointer style path of the changed sub-resource, used as the `path` field of the
    /// published envelope.
    pub fn resource_path(&self) -> String {
        match self {
            PolicyEvent::Created { .. }
            | PolicyEvent::Modified { .. }
            | PolicyEvent::Deleted { .. } => "/".to_owned(),
            PolicyEvent::EntryCreated { label, .. }
            | PolicyEvent::EntryModified { label, .. }
            | PolicyEvent::EntryDeleted { label, .. } => format!("/entries/{label}"),
            PolicyEvent::SubjectCreated { label, subject, .. }
            | PolicyEvent::SubjectModified { label, subject, .. } => {
                format!("/entries/{label}/subjects/{}", subject.id)
            }
            PolicyEvent::SubjectsModified { label, .. } => format!("/entries/{label}/subjects"),
            PolicyEvent::SubjectDeleted {
                label, subject_id, ..
            } => format!("/entries/{label}/subjects/{subject_id}"),
            PolicyEvent::ResourceCreated {
                label, resource, ..
            }
            | PolicyEvent::ResourceModified {
                label, resource, ..
            } => format!("/entries/{label}/resources/{}", resource.key),
            PolicyEvent::ResourceDeleted { label, key, .. } => {
                format!("/entries/{label}/resources/{key}")
            }
        }
    }

    /// Apply this event to the aggregate state.
    ///
    /// The transition is deterministic: replaying the same event sequence against the same
    /// initial state always yields the same aggregate. Application sets revision and modified
    /// time from the event. Events other than `Created` applied to a nonexistent entity leave
    /// it nonexistent.
    pub fn apply(&self, state: Option<Policy>) -> Option<Policy> {
        match self {
            PolicyEvent::Created {
                id,
                entries,
                revision,
                timestamp,
            } => Some(
                Policy::new(id.clone(), entries.clone())
                    .with_revision(*revision)
                    .with_modified(*timestamp),
            ),
            PolicyEvent::Modified { entries, .. } => {
                self.finish(state.map(|p| p.with_entries(entries.clone())))
            }
            PolicyEvent::Deleted { .. } => {
                self.finish(state.map(|p| p.with_lifecycle(Lifecycle::Deleted)))
            }
            PolicyEvent::EntryCreated { label, entry, .. }
            | PolicyEvent::EntryModified { label, entry, .. } => {
                self.finish(state.map(|p| p.with_entry(label.clone(), entry.clone())))
            }
            PolicyEvent::EntryDeleted { label, .. } => {
                self.finish(state.map(|p| p.without_entry(label)))
            }
            PolicyEvent::SubjectCreated { label, subject, .. }
            | PolicyEvent::SubjectModified { label, subject, .. } => {
                self.finish(state.map(|p| p.with_subject(label, subject.clone())))
            }
            PolicyEvent::SubjectsModified {
                label, subjects, ..
            } => self.finish(state.map(|p| p.with_subjects(label, subjects.clone()))),
            PolicyEvent::SubjectDeleted {
                label, subject_id, ..
            } => self.finish(state.map(|p| p.without_subject(label, subject_id))),
            PolicyEvent::ResourceCreated {
                label, resource, ..
            }
            | PolicyEvent::ResourceModified {
                label, resource, ..
            } => self.finish(state.map(|p| p.with_resource(label, resource.clone()))),
            PolicyEvent::ResourceDeleted { label, key, .. } => {
                self.finish(state.map(|p| p.without_resource(label, key)))
            }
        }
    }

    fn finish(&self, state: Option<Policy>) -> Option<Policy> {
        state.map(|p| {
            p.with_revision(self.revision())
                .with_modified(self.timestamp())
        })
    }
}

impl fmt::Display for PolicyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} on {}",
            self.resource_path(),
            self.revision(),
            self.policy_id()
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::entry::Label;
    use crate::id::PolicyId;
    use crate::policy::Lifecycle;
    use crate::subject::SubjectId;
    use crate::test_policy;
    use crate::timestamp::Timestamp;

    use super::PolicyEvent;

    #[test]
    fn created_replaces_any_previous_state() {
        let template = test_policy("org.example", "events");
        let event = PolicyEvent::Created {
            id: template.id.clone(),
            entries: template.entries.clone(),
            revision: 1,
            timestamp: Timestamp::from_secs(100),
        };

        let policy = event.apply(None).unwrap();
        assert_eq!(policy.revision, 1);
        assert_eq!(policy.lifecycle, Lifecycle::Active);
        assert_eq!(policy.modified, Some(Timestamp::from_secs(100)));

        // Recreating a deleted policy continues at the event's revision.
        let deleted = policy.with_lifecycle(Lifecycle::Deleted).with_revision(2);
        let recreated = PolicyEvent::Created {
            id: template.id,
            entries: template.entries,
            revision: 3,
            timestamp: Timestamp::from_secs(200),
        }
        .apply(Some(deleted))
        .unwrap();

        assert!(recreated.is_active());
        assert_eq!(recreated.revision, 3);
    }

    #[test]
    fn replay_is_deterministic() {
        let template = test_policy("org.example", "replay");
        let label = Label::new("owner").unwrap();
        let subject_id = SubjectId::new("google", "admin").unwrap();

        let events = vec![
            PolicyEvent::Created {
                id: template.id.clone(),
                entries: template.entries.clone(),
                revision: 1,
                timestamp: Timestamp::from_secs(1),
            },
            PolicyEvent::SubjectDeleted {
                id: template.id.clone(),
                label: label.clone(),
                subject_id: subject_id.clone(),
                revision: 2,
                timestamp: Timestamp::from_secs(2),
            },
            PolicyEvent::Deleted {
                id: template.id.clone(),
                revision: 3,
                timestamp: Timestamp::from_secs(3),
            },
        ];

        let replay = |events: &[PolicyEvent]| {
            events
                .iter()
                .fold(None, |state, event| event.apply(state))
        };

        let first = replay(&events).unwrap();
        let second = replay(&events).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.revision, 3);
        assert!(first.is_deleted());
        assert!(first.entry(&label).unwrap().subjects.is_empty());
    }

    #[test]
    fn non_create_events_need_existing_state() {
        let id = PolicyId::new("org.example", "ghost").unwrap();
        let event = PolicyEvent::Deleted {
            id,
            revision: 1,
            timestamp: Timestamp::from_secs(1),
        };

        assert!(event.apply(None).is_none());
    }

    #[test]
    fn resource_paths_point_at_the_change() {
        let template = test_policy("org.example", "paths");
        let event = PolicyEvent::SubjectDeleted {
            id: template.id,
            label: Label::new("owner").unwrap(),
            subject_id: SubjectId::new("google", "admin").unwrap(),
            revision: 2,
            timestamp: Timestamp::from_secs(2),
        };

        assert_eq!(
            event.resource_path(),
            "/entries/owner/subjects/google:admin"
        );
        assert_eq!(event.name(), "deleted");
    }
}
