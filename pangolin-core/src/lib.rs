// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core data types for authorization policies.
//!
//! A policy is an aggregate of labelled entries, each granting or revoking permissions on
//! resources to subjects. Policies are versioned by a monotonically increasing revision and
//! mutated exclusively through a closed set of commands which, when accepted, produce exactly
//! one event. Replaying the event sequence deterministically reconstructs the aggregate.
pub mod cbor;
pub mod command;
pub mod entry;
pub mod event;
pub mod id;
pub mod policy;
pub mod resource;
pub mod subject;
pub mod timestamp;
pub mod validation;

pub use cbor::{DecodeError, EncodeError, decode_cbor, encode_cbor};
pub use command::{PolicyCommand, PolicyError, PolicyResponse};
pub use entry::{Label, LabelError, PolicyEntry};
pub use event::PolicyEvent;
pub use id::{PolicyId, PolicyIdError};
pub use policy::{Lifecycle, Policy};
pub use resource::{
    EffectedPermissions, Permission, PermissionError, Permissions, Resource, ResourceKey,
    ResourceKeyError,
};
pub use subject::{Subject, SubjectAnnouncement, SubjectId, SubjectIdError, SubjectType};
pub use timestamp::{ExpiryGranularity, GranularityError, Timestamp};
pub use validation::{PolicyValidator, ValidationError};

/// Minimal valid policy with one entry holding a permanent administrative subject.
#[cfg(test)]
pub(crate) fn test_policy(namespace: &str, name: &str) -> Policy {
    let subject = Subject::new(SubjectId::new("google", "admin").unwrap());
    let resource = Resource::new(
        ResourceKey::policy_root(),
        EffectedPermissions::granted([Permission::Read, Permission::Write]),
    );
    let entry = PolicyEntry::new().with_subject(subject).with_resource(resource);

    Policy::new(
        PolicyId::new(namespace, name).unwrap(),
        [(Label::new("owner").unwrap(), entry)].into(),
    )
}
