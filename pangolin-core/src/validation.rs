// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structural and authorization invariants of a policy.
//!
//! The validator is invoked on the prospective post-mutation state of every mutating command,
//! before any event is persisted. A failing check rejects the command without state change.
use thiserror::Error;

use crate::cbor::{EncodeError, encode_cbor};
use crate::entry::{Label, PolicyEntry};
use crate::policy::Policy;
use crate::resource::{Permission, ResourceKey};
use crate::subject::SubjectId;
use crate::timestamp::Timestamp;

/// Validates policies against the global authorization invariant and a serialized size limit.
///
/// The size limit is threaded in at construction; there is no global configuration state.
#[derive(Clone, Debug)]
pub struct PolicyValidator {
    max_policy_size: usize,
}

impl PolicyValidator {
    pub fn new(max_policy_size: usize) -> Self {
        Self { max_policy_size }
    }

    /// Check a prospective policy state.
    ///
    /// In order: entries must be non-empty, every entry needs at least one subject and one
    /// resource, at least one entry must hold a permanent administrative subject, and the
    /// CBOR-encoded size must stay within the configured limit.
    pub fn validate(&self, policy: &Policy) -> Result<(), ValidationError> {
        if policy.entries.is_empty() {
            return Err(ValidationError::NoEntries);
        }

        for (label, entry) in &policy.entries {
            if entry.subjects.is_empty() {
                return Err(ValidationError::EntryWithoutSubjects {
                    label: label.clone(),
                });
            }
            if entry.resources.is_empty() {
                return Err(ValidationError::EntryWithoutResources {
                    label: label.clone(),
                });
            }
        }

        if !policy.entries.values().any(has_permanent_admin) {
            return Err(ValidationError::NoPermanentAdmin);
        }

        let actual = encode_cbor(policy)?.len();
        if actual > self.max_policy_size {
            return Err(ValidationError::TooLarge {
                actual,
                limit: self.max_policy_size,
            });
        }

        Ok(())
    }

    /// Reject any subject whose expiry is not in the future.
    ///
    /// Runs against expiry values as supplied by the caller, before rounding; rounding never
    /// lifts an already-elapsed expiry back into validity.
    pub fn check_expiries(&self, policy: &Policy, now: Timestamp) -> Result<(), ValidationError> {
        for (_, subject) in policy.subjects() {
            if let Some(expiry) = subject.expiry
                && expiry <= now
            {
                return Err(ValidationError::ExpiryInPast {
                    subject_id: subject.id.clone(),
                    expiry,
                });
            }
        }

        Ok(())
    }
}

/// The "permanent administrative subject" predicate: the entry holds at least one subject
/// without expiry and a resource for the policy root which grants and does not revoke `write`.
///
/// Only the exact `policy:/` key counts; there is no prefix matching, administration of the
/// policy document is modelled as write access on its own root resource.
fn has_permanent_admin(entry: &PolicyEntry) -> bool {
    let permanent_subject = entry.subjects.values().any(|subject| subject.is_permanent());

    let admin_resource = entry
        .resource(&ResourceKey::policy_root())
        .is_some_and(|resource| {
            resource.grants(Permission::Write) && !resource.revokes(Permission::Write)
        });

    permanent_subject && admin_resource
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("policy has no entries")]
    NoEntries,

    #[error("policy entry {label} has no subjects")]
    EntryWithoutSubjects { label: Label },

    #[error("policy entry {label} has no resources")]
    EntryWithoutResources { label: Label },

    #[error("policy has no permanent subject with administrative access")]
    NoPermanentAdmin,

    #[error("policy size of {actual} bytes exceeds the limit of {limit} bytes")]
    TooLarge { actual: usize, limit: usize },

    #[error("subject {subject_id} expiry {expiry} is already in the past")]
    ExpiryInPast {
        subject_id: SubjectId,
        expiry: Timestamp,
    },

    #[error("policy could not be encoded for size accounting: {0}")]
    Encode(String),
}

impl From<EncodeError> for ValidationError {
    fn from(err: EncodeError) -> Self {
        ValidationError::Encode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::entry::{Label, PolicyEntry};
    use crate::resource::{EffectedPermissions, Permission, Resource, ResourceKey};
    use crate::subject::{Subject, SubjectId};
    use crate::test_policy;
    use crate::timestamp::Timestamp;

    use super::{PolicyValidator, ValidationError};

    fn validator() -> PolicyValidator {
        PolicyValidator::new(100 * 1024)
    }

    #[test]
    fn accepts_minimal_valid_policy() {
        assert_eq!(validator().validate(&test_policy("org.example", "ok")), Ok(()));
    }

    #[test]
    fn rejects_empty_policies_and_entries() {
        let policy = test_policy("org.example", "empty");
        let label = Label::new("owner").unwrap();

        let no_entries = policy.clone().without_entry(&label);
        assert_eq!(
            validator().validate(&no_entries),
            Err(ValidationError::NoEntries)
        );

        let subject_id = SubjectId::new("google", "admin").unwrap();
        let no_subjects = policy.clone().without_subject(&label, &subject_id);
        assert!(matches!(
            validator().validate(&no_subjects),
            Err(ValidationError::EntryWithoutSubjects { .. })
        ));

        let no_resources = policy.without_resource(&label, &ResourceKey::policy_root());
        assert!(matches!(
            validator().validate(&no_resources),
            Err(ValidationError::EntryWithoutResources { .. })
        ));
    }

    #[test]
    fn rejects_missing_permanent_admin() {
        let label = Label::new("owner").unwrap();

        // The only admin-granting subject expires: not permanent.
        let expiring_admin = test_policy("org.example", "expiring").with_subject(
            &label,
            Subject::new(SubjectId::new("google", "admin").unwrap())
                .with_expiry(Timestamp::from_secs(10_000)),
        );
        assert_eq!(
            validator().validate(&expiring_admin),
            Err(ValidationError::NoPermanentAdmin)
        );

        // Write on the policy root is granted but also revoked.
        let revoked = test_policy("org.example", "revoked").with_resource(
            &label,
            Resource::new(
                ResourceKey::policy_root(),
                EffectedPermissions {
                    granted: [Permission::Write].into_iter().collect(),
                    revoked: [Permission::Write].into_iter().collect(),
                },
            ),
        );
        assert_eq!(
            validator().validate(&revoked),
            Err(ValidationError::NoPermanentAdmin)
        );

        // Write is granted on some other resource type only.
        let wrong_resource = test_policy("org.example", "wrong")
            .without_resource(&label, &ResourceKey::policy_root())
            .with_resource(
                &label,
                Resource::new(
                    ResourceKey::new("thing", "/").unwrap(),
                    EffectedPermissions::granted([Permission::Write]),
                ),
            );
        assert_eq!(
            validator().validate(&wrong_resource),
            Err(ValidationError::NoPermanentAdmin)
        );
    }

    #[test]
    fn rejects_oversized_policies() {
        let tiny = PolicyValidator::new(16);
        let result = tiny.validate(&test_policy("org.example", "large"));
        assert!(matches!(result, Err(ValidationError::TooLarge { .. })));
    }

    #[test]
    fn rejects_elapsed_expiries() {
        let label = Label::new("owner").unwrap();
        let policy = test_policy("org.example", "expiry").with_subject(
            &label,
            Subject::new(SubjectId::new("google", "temp").unwrap())
                .with_expiry(Timestamp::from_secs(50)),
        );

        assert!(matches!(
            validator().check_expiries(&policy, Timestamp::from_secs(50)),
            Err(ValidationError::ExpiryInPast { .. })
        ));
        assert_eq!(
            validator().check_expiries(&policy, Timestamp::from_secs(49)),
            Ok(())
        );
    }
}
