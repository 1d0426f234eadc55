// SPDX-License-Identifier: MIT OR Apache-2.0

//! Labelled policy entries.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::{Resource, ResourceKey};
use crate::subject::{Subject, SubjectId};

/// Label of a policy entry, unique within its policy.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(String);

impl Label {
    /// Validated construction, the label must be non-empty and must not contain slashes.
    pub fn new(value: &str) -> Result<Self, LabelError> {
        if value.is_empty() {
            return Err(LabelError::Empty);
        }

        if value.contains('/') {
            return Err(LabelError::ContainsSlash(value.to_owned()));
        }

        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Label {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Label {
    type Error = LabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Label> for String {
    fn from(value: Label) -> Self {
        value.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("policy entry label must not be empty")]
    Empty,

    #[error("policy entry label must not contain slashes: {0}")]
    ContainsSlash(String),
}

/// A labelled entry of a policy, holding the subjects it applies to and the resources it
/// effects permissions on.
///
/// Subjects are unique by their id, resources by their key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub subjects: BTreeMap<SubjectId, Subject>,
    pub resources: BTreeMap<ResourceKey, Resource>,
}

impl PolicyEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subjects.insert(subject.id.clone(), subject);
        self
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.insert(resource.key.clone(), resource);
        self
    }

    pub fn subject(&self, id: &SubjectId) -> Option<&Subject> {
        self.subjects.get(id)
    }

    pub fn resource(&self, key: &ResourceKey) -> Option<&Resource> {
        self.resources.get(key)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::resource::{EffectedPermissions, Permission, Resource, ResourceKey};
    use crate::subject::{Subject, SubjectId};

    use super::{Label, LabelError, PolicyEntry};

    #[test]
    fn label_validation() {
        assert!(Label::new("owner").is_ok());
        assert_eq!(Label::new(""), Err(LabelError::Empty));
        assert!(matches!(
            Label::from_str("with/slash"),
            Err(LabelError::ContainsSlash(_))
        ));
    }

    #[test]
    fn subjects_are_unique_by_id() {
        let id = SubjectId::new("google", "alice").unwrap();
        let entry = PolicyEntry::new()
            .with_subject(Subject::new(id.clone()))
            .with_subject(Subject::new(id.clone()));

        assert_eq!(entry.subjects.len(), 1);
        assert!(entry.subject(&id).is_some());
    }

    #[test]
    fn resources_are_unique_by_key() {
        let resource = Resource::new(
            ResourceKey::policy_root(),
            EffectedPermissions::granted([Permission::Write]),
        );
        let entry = PolicyEntry::new()
            .with_resource(resource.clone())
            .with_resource(resource);

        assert_eq!(entry.resources.len(), 1);
    }
}
