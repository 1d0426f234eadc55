// SPDX-License-Identifier: MIT OR Apache-2.0

//! The closed set of policy commands, their responses and typed failures.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entry::{Label, PolicyEntry};
use crate::id::PolicyId;
use crate::policy::Policy;
use crate::resource::{Resource, ResourceKey};
use crate::subject::{Subject, SubjectId};
use crate::timestamp::Timestamp;

/// A command addressed to a single policy entity.
///
/// Each command either reads state or describes exactly one mutation. Accepted mutations
/// produce exactly one event; reads produce none.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyCommand {
    /// Create the policy with the given initial entries.
    ///
    /// Fails when the policy already exists and is active. Recreating a deleted policy is
    /// allowed and continues its revision sequence.
    Create {
        id: PolicyId,
        entries: BTreeMap<Label, PolicyEntry>,
    },

    /// Replace all entries of an existing policy.
    Modify {
        id: PolicyId,
        entries: BTreeMap<Label, PolicyEntry>,
    },

    /// Retrieve the full policy.
    Retrieve { id: PolicyId },

    /// Mark the policy as deleted. The entity stays addressable and may be recreated.
    Delete { id: PolicyId },

    /// Create or replace a single entry.
    ModifyEntry {
        id: PolicyId,
        label: Label,
        entry: PolicyEntry,
    },

    /// Retrieve a single entry.
    RetrieveEntry { id: PolicyId, label: Label },

    /// Delete a single entry.
    DeleteEntry { id: PolicyId, label: Label },

    /// Create or replace a single subject of an entry.
    ModifySubject {
        id: PolicyId,
        label: Label,
        subject: Subject,
    },

    /// Replace the full subject set of an entry.
    ModifySubjects {
        id: PolicyId,
        label: Label,
        subjects: BTreeMap<SubjectId, Subject>,
    },

    /// Retrieve a single subject of an entry.
    RetrieveSubject {
        id: PolicyId,
        label: Label,
        subject_id: SubjectId,
    },

    /// Delete a single subject of an entry.
    DeleteSubject {
        id: PolicyId,
        label: Label,
        subject_id: SubjectId,
    },

    /// Create or replace a single resource of an entry.
    ModifyResource {
        id: PolicyId,
        label: Label,
        resource: Resource,
    },

    /// Retrieve a single resource of an entry.
    RetrieveResource {
        id: PolicyId,
        label: Label,
        key: ResourceKey,
    },

    /// Delete a single resource of an entry.
    DeleteResource {
        id: PolicyId,
        label: Label,
        key: ResourceKey,
    },
}

impl PolicyCommand {
    /// The policy entity this command is addressed to.
    pub fn policy_id(&self) -> &PolicyId {
        match self {
            PolicyCommand::Create { id, .. }
            | PolicyCommand::Modify { id, .. }
            | PolicyCommand::Retrieve { id }
            | PolicyCommand::Delete { id }
            | PolicyCommand::ModifyEntry { id, .. }
            | PolicyCommand::RetrieveEntry { id, .. }
            | PolicyCommand::DeleteEntry { id, .. }
            | PolicyCommand::ModifySubject { id, .. }
            | PolicyCommand::ModifySubjects { id, .. }
            | PolicyCommand::RetrieveSubject { id, .. }
            | PolicyCommand::DeleteSubject { id, .. }
            | PolicyCommand::ModifyResource { id, .. }
            | PolicyCommand::RetrieveResource { id, .. }
            | PolicyCommand::DeleteResource { id, .. } => id,
        }
    }

    /// Returns `true` for commands which mutate state when accepted.
    pub fn is_modifying(&self) -> bool {
        !matches!(
            self,
            PolicyCommand::Retrieve { .. }
                | PolicyCommand::RetrieveEntry { .. }
                | PolicyCommand::RetrieveSubject { .. }
                | PolicyCommand::RetrieveResource { .. }
        )
    }

    /// Logical name of the command on the wire, used as the streaming topic action and in
    /// logging.
    pub fn name(&self) -> &'static str {
        match self {
            PolicyCommand::Create { .. } => "createPolicy",
            PolicyCommand::Modify { .. } => "modifyPolicy",
            PolicyCommand::Retrieve { .. } => "retrievePolicy",
            PolicyCommand::Delete { .. } => "deletePolicy",
            PolicyCommand::ModifyEntry { .. } => "modifyPolicyEntry",
            PolicyCommand::RetrieveEntry { .. } => "retrievePolicyEntry",
            PolicyCommand::DeleteEntry { .. } => "deletePolicyEntry",
            PolicyCommand::ModifySubject { .. } => "modifySubject",
            PolicyCommand::ModifySubjects { .. } => "modifySubjects",
            PolicyCommand::RetrieveSubject { .. } => "retrieveSubject",
            PolicyCommand::DeleteSubject { .. } => "deleteSubject",
            PolicyCommand::ModifyResource { .. } => "modifyResource",
            PolicyCommand::RetrieveResource { .. } => "retrieveResource",
            PolicyCommand::DeleteResource { .. } => "deleteResource",
        }
    }
}

impl fmt::Display for PolicyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.name(), self.policy_id())
    }
}

/// Successful outcome of a policy command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyResponse {
    /// The policy was created; carries the stored state including normalized expiries.
    Created { policy: Policy },

    /// A mutation was applied at the given revision.
    ///
    /// `created` is `true` when the addressed entry, subject or resource did not exist before.
    Modified { revision: u64, created: bool },

    /// A mutation deleted the addressed policy, entry, subject or resource.
    Deleted { revision: u64 },

    Retrieved { policy: Policy },

    RetrievedEntry { entry: PolicyEntry },

    RetrievedSubject { subject: Subject },

    RetrievedResource { resource: Resource },
}

/// Typed failure of a policy command.
///
/// Validation failures are detected before any event is persisted and never change state.
/// Sequencing all commands of one entity through a single mailbox rules out concurrent
/// modification, which is why no such variant exists.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The addressed policy, entry, subject or resource does not exist, or the policy is in
    /// deleted lifecycle for a read.
    #[error("{path} not found on policy {id}")]
    NotFound { id: PolicyId, path: String },

    /// Creation was requested for a policy which already exists and is active.
    #[error("policy {id} already exists")]
    AlreadyExists { id: PolicyId },

    /// The mutation would leave the policy without a permanent administrative subject or
    /// otherwise structurally invalid.
    #[error("mutation would invalidate policy {id}: {reason}")]
    WouldInvalidate { id: PolicyId, reason: String },

    /// The serialized policy would exceed the configured size limit.
    #[error("policy size of {actual} bytes exceeds the limit of {limit} bytes")]
    TooLarge { actual: usize, limit: usize },

    /// A subject expiry is already in the past.
    #[error("subject {subject_id} expiry {expiry} is already in the past")]
    ExpiryInPast {
        subject_id: SubjectId,
        expiry: Timestamp,
    },

    /// The persistence layer failed; in-memory state is unchanged and the command may be
    /// retried by the caller.
    #[error("persistence failure: {reason}")]
    Persistence { reason: String },
}

#[cfg(test)]
mod tests {
    use crate::id::PolicyId;

    use super::PolicyCommand;

    #[test]
    fn modifying_classification() {
        let id = PolicyId::new("org.example", "policy-1").unwrap();

        assert!(
            PolicyCommand::Delete { id: id.clone() }.is_modifying()
        );
        assert!(!PolicyCommand::Retrieve { id }.is_modifying());
    }

    #[test]
    fn logical_names_are_lower_camel() {
        let id = PolicyId::new("org.example", "policy-1").unwrap();
        let command = PolicyCommand::Create {
            id,
            entries: Default::default(),
        };

        assert_eq!(command.name(), "createPolicy");
        assert_eq!(command.to_string(), "createPolicy on org.example:policy-1");
    }
}
