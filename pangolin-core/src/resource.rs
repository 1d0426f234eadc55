// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resources and the permissions effected on them.
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const SEPARATOR: char = ':';

/// A single permission which can be granted or revoked on a resource.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Permission {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            other => Err(PermissionError::Unknown(other.to_owned())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("unknown permission: {0}")]
    Unknown(String),
}

/// Ordered set of permissions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permissions(BTreeSet<Permission>);

impl Permissions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn insert(mut self, permission: Permission) -> Self {
        self.0.insert(permission);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Permission> for Permissions {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Permissions granted and revoked on a resource.
///
/// Revocations take precedence over grants on the same resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectedPermissions {
    pub granted: Permissions,
    pub revoked: Permissions,
}

impl EffectedPermissions {
    /// Grant the given permissions, revoking none.
    pub fn granted<I: IntoIterator<Item = Permission>>(permissions: I) -> Self {
        Self {
            granted: permissions.into_iter().collect(),
            revoked: Permissions::none(),
        }
    }
}

/// Addresses a resource within a policy, composed of a resource type and a JSON-pointer style
/// path.
///
/// The canonical string form is `type:/path`; the path always keeps its leading `/`, the root
/// path of a resource type is `/` on its own.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey {
    resource_type: String,
    path: String,
}

impl ResourceKey {
    /// Validated construction from resource type and path.
    pub fn new(resource_type: &str, path: &str) -> Result<Self, ResourceKeyError> {
        if resource_type.is_empty() || resource_type.contains(SEPARATOR) {
            return Err(ResourceKeyError::InvalidType(resource_type.to_owned()));
        }

        if !path.starts_with('/') {
            return Err(ResourceKeyError::PathWithoutLeadingSlash(path.to_owned()));
        }

        Ok(Self {
            resource_type: resource_type.to_owned(),
            path: path.to_owned(),
        })
    }

    /// The root resource of the policy itself.
    ///
    /// Granting `write` here authorizes administration of the whole policy document.
    pub fn policy_root() -> Self {
        Self {
            resource_type: "policy".to_owned(),
            path: "/".to_owned(),
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl FromStr for ResourceKey {
    type Err = ResourceKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource_type, path) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| ResourceKeyError::MissingSeparator(s.to_owned()))?;
        Self::new(resource_type, path)
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = ResourceKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<ResourceKey> for String {
    fn from(value: ResourceKey) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.resource_type, self.path)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceKeyError {
    #[error("resource key is missing the type separator: {0}")]
    MissingSeparator(String),

    #[error("invalid resource type: {0}")]
    InvalidType(String),

    #[error("resource path must start with a slash: {0}")]
    PathWithoutLeadingSlash(String),
}

/// A resource with the permissions effected on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub key: ResourceKey,
    pub effected: EffectedPermissions,
}

impl Resource {
    pub fn new(key: ResourceKey, effected: EffectedPermissions) -> Self {
        Self { key, effected }
    }

    /// Returns `true` when the permission is granted on this resource.
    pub fn grants(&self, permission: Permission) -> bool {
        self.effected.granted.contains(permission)
    }

    /// Returns `true` when the permission is revoked on this resource.
    pub fn revokes(&self, permission: Permission) -> bool {
        self.effected.revoked.contains(permission)
    }
}
