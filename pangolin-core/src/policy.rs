// SPDX-License-Identifier: MIT OR Apache-2.0

//! The policy aggregate.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entry::{Label, PolicyEntry};
use crate::id::PolicyId;
use crate::resource::{Resource, ResourceKey};
use crate::subject::{Subject, SubjectId};
use crate::timestamp::Timestamp;

/// Lifecycle of a policy entity.
///
/// A deleted policy remains addressable and may be recreated; permanent removal is an
/// out-of-band administrative operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Active,
    Deleted,
}

/// An authorization policy: labelled entries granting or revoking permissions on resources to
/// subjects.
///
/// The aggregate is mutated through copy-on-write operations only; every accepted mutation
/// increments the revision by exactly one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub entries: BTreeMap<Label, PolicyEntry>,
    pub lifecycle: Lifecycle,
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<Timestamp>,
}

impl Policy {
    /// Fresh active policy at revision zero; the revision is set when the creation event is
    /// applied.
    pub fn new(id: PolicyId, entries: BTreeMap<Label, PolicyEntry>) -> Self {
        Self {
            id,
            entries,
            lifecycle: Lifecycle::Active,
            revision: 0,
            modified: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }

    pub fn is_deleted(&self) -> bool {
        self.lifecycle == Lifecycle::Deleted
    }

    pub fn entry(&self, label: &Label) -> Option<&PolicyEntry> {
        self.entries.get(label)
    }

    /// Iterate over all subjects of all entries, with their entry label.
    pub fn subjects(&self) -> impl Iterator<Item = (&Label, &Subject)> {
        self.entries
            .iter()
            .flat_map(|(label, entry)| entry.subjects.values().map(move |subject| (label, subject)))
    }

    pub fn with_entries(mut self, entries: BTreeMap<Label, PolicyEntry>) -> Self {
        self.entries = entries;
        self
    }

    pub fn with_entry(mut self, label: Label, entry: PolicyEntry) -> Self {
        self.entries.insert(label, entry);
        self
    }

    pub fn without_entry(mut self, label: &Label) -> Self {
        self.entries.remove(label);
        self
    }

    pub fn with_subject(mut self, label: &Label, subject: Subject) -> Self {
        self.entries
            .entry(label.clone())
            .or_default()
            .subjects
            .insert(subject.id.clone(), subject);
        self
    }

    pub fn without_subject(mut self, label: &Label, subject_id: &SubjectId) -> Self {
        if let Some(entry) = self.entries.get_mut(label) {
            entry.subjects.remove(subject_id);
        }
        self
    }

    pub fn with_subjects(mut self, label: &Label, subjects: BTreeMap<SubjectId, Subject>) -> Self {
        self.entries.entry(label.clone()).or_default().subjects = subjects;
        self
    }

    pub fn with_resource(mut self, label: &Label, resource: Resource) -> Self {
        self.entries
            .entry(label.clone())
            .or_default()
            .resources
            .insert(resource.key.clone(), resource);
        self
    }

    pub fn without_resource(mut self, label: &Label, key: &ResourceKey) -> Self {
        if let Some(entry) = self.entries.get_mut(label) {
            entry.resources.remove(key);
        }
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_modified(mut self, modified: Timestamp) -> Self {
        self.modified = Some(modified);
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::entry::{Label, PolicyEntry};
    use crate::resource::{EffectedPermissions, Permission, Resource, ResourceKey};
    use crate::subject::{Subject, SubjectId};
    use crate::test_policy;

    use super::Lifecycle;

    #[test]
    fn copy_on_write_leaves_original_untouched() {
        let policy = test_policy("org.example", "cow");
        let label = Label::new("owner").unwrap();

        let mutated = policy
            .clone()
            .without_entry(&label)
            .with_lifecycle(Lifecycle::Deleted);

        assert!(policy.entry(&label).is_some());
        assert!(policy.is_active());
        assert!(mutated.entry(&label).is_none());
        assert!(mutated.is_deleted());
    }

    #[test]
    fn subject_iteration_spans_entries() {
        let extra = PolicyEntry::new()
            .with_subject(Subject::new(SubjectId::new("google", "bob").unwrap()))
            .with_resource(Resource::new(
                ResourceKey::new("thing", "/").unwrap(),
                EffectedPermissions::granted([Permission::Read]),
            ));

        let policy = test_policy("org.example", "iter")
            .with_entry(Label::new("viewer").unwrap(), extra);

        assert_eq!(policy.subjects().count(), 2);
    }

    #[test]
    fn subject_removal_on_missing_entry_is_a_no_op() {
        let policy = test_policy("org.example", "noop");
        let missing = Label::new("missing").unwrap();
        let subject_id = SubjectId::new("google", "nobody").unwrap();

        let unchanged = policy.clone().without_subject(&missing, &subject_id);
        assert_eq!(unchanged, policy);
    }
}
