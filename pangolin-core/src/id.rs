// SPDX-License-Identifier: MIT OR Apache-2.0

//! Policy identifiers.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const SEPARATOR: char = ':';

/// Unique identifier of a policy, composed of a namespace and a name.
///
/// The canonical string form is `namespace:name`. The namespace is a non-empty dot-separated
/// sequence of segments in reverse-domain style (`org.example.iot`); every admitted id can
/// therefore be addressed as a topic path. Namespace and name are immutable once the policy has
/// been created.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PolicyId {
    namespace: String,
    name: String,
}

impl PolicyId {
    /// Validated construction from namespace and name parts.
    pub fn new(namespace: &str, name: &str) -> Result<Self, PolicyIdError> {
        if !is_valid_namespace(namespace) {
            return Err(PolicyIdError::InvalidNamespace(namespace.to_owned()));
        }

        if !is_valid_name(name) {
            return Err(PolicyIdError::InvalidName(name.to_owned()));
        }

        Ok(Self {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        })
    }

    /// Namespace part.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name part, unique within the namespace.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A namespace consists of dot-separated segments, each starting with an ASCII letter followed
/// by ASCII alphanumerics, underscores or hyphens. An empty namespace is rejected: topic paths
/// carry the namespace as their first slash-separated segment, which must not be empty.
fn is_valid_namespace(namespace: &str) -> bool {
    namespace.split('.').all(|segment| {
        let mut chars = segment.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            }
            _ => false,
        }
    })
}

/// A name is non-empty printable ASCII without slashes or control characters.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_graphic() && c != '/' && c != SEPARATOR)
}

impl FromStr for PolicyId {
    type Err = PolicyIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| PolicyIdError::MissingSeparator(s.to_owned()))?;
        Self::new(namespace, name)
    }
}

impl TryFrom<String> for PolicyId {
    type Error = PolicyIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<PolicyId> for String {
    fn from(value: PolicyId) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.namespace, self.name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyIdError {
    /// The string form lacks the `:` between namespace and name.
    #[error("policy id is missing the namespace separator: {0}")]
    MissingSeparator(String),

    /// The namespace is not a valid dot-separated segment sequence.
    #[error("invalid policy namespace: {0}")]
    InvalidNamespace(String),

    /// The name is empty or contains forbidden characters.
    #[error("invalid policy name: {0}")]
    InvalidName(String),
}
