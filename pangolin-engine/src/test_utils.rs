// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared helpers for runtime tests.
use std::collections::BTreeMap;

use pangolin_core::{
    EffectedPermissions, Label, Permission, PolicyEntry, Resource, ResourceKey, Subject,
    SubjectId,
};

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Entries of a minimal valid policy: one entry holding a permanent administrative subject.
pub fn admin_entries() -> BTreeMap<Label, PolicyEntry> {
    let entry = PolicyEntry::new()
        .with_subject(Subject::new(
            SubjectId::new("google", "admin").expect("valid subject id"),
        ))
        .with_resource(Resource::new(
            ResourceKey::policy_root(),
            EffectedPermissions::granted([Permission::Read, Permission::Write]),
        ));

    [(Label::new("owner").expect("valid label"), entry)].into()
}
