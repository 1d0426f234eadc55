// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subjects: authenticated principals referenced by policy entries.
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timestamp::Timestamp;

const SEPARATOR: char = ':';

/// Identifier of a subject, composed of the issuer of the authentication provider and the
/// subject string issued by it.
///
/// The canonical string form is `issuer:subject`, split on the first `:` (the subject part may
/// itself contain colons).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId {
    issuer: String,
    subject: String,
}

impl SubjectId {
    /// Validated construction from issuer and subject parts, both non-empty.
    pub fn new(issuer: &str, subject: &str) -> Result<Self, SubjectIdError> {
        if issuer.is_empty() || issuer.contains(SEPARATOR) {
            return Err(SubjectIdError::InvalidIssuer(issuer.to_owned()));
        }

        if subject.is_empty() {
            return Err(SubjectIdError::InvalidSubject(subject.to_owned()));
        }

        Ok(Self {
            issuer: issuer.to_owned(),
            subject: subject.to_owned(),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl FromStr for SubjectId {
    type Err = SubjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (issuer, subject) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| SubjectIdError::MissingSeparator(s.to_owned()))?;
        Self::new(issuer, subject)
    }
}

impl TryFrom<String> for SubjectId {
    type Error = SubjectIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

impl From<SubjectId> for String {
    fn from(value: SubjectId) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.issuer, self.subject)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubjectIdError {
    #[error("subject id is missing the issuer separator: {0}")]
    MissingSeparator(String),

    #[error("invalid subject issuer: {0}")]
    InvalidIssuer(String),

    #[error("invalid subject part: {0}")]
    InvalidSubject(String),
}

/// Free-form description of how a subject was provisioned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectType(String);

impl SubjectType {
    pub fn new(value: &str) -> Self {
        Self(value.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubjectType {
    fn default() -> Self {
        Self("generated".to_owned())
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Announcement settings of a subject with an expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectAnnouncement {
    /// Announce the upcoming deletion this long before the subject expires.
    ///
    /// When the computed announce time is already past at scheduling time the announcement is
    /// published immediately.
    pub before_expiry: Option<Duration>,

    /// Additionally announce when the subject has actually been deleted.
    pub when_deleted: bool,
}

/// An authenticated principal attached to a policy entry.
///
/// Subjects without an expiry are permanent. Expiring subjects are deleted by the runtime once
/// their expiry has elapsed; the expiry timestamp is rounded up to the configured scheduling
/// granularity at the moment it is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,

    #[serde(default)]
    pub subject_type: SubjectType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announcement: Option<SubjectAnnouncement>,
}

impl Subject {
    /// Permanent subject of the default type.
    pub fn new(id: SubjectId) -> Self {
        Self {
            id,
            subject_type: SubjectType::default(),
            expiry: None,
            announcement: None,
        }
    }

    pub fn with_type(mut self, subject_type: SubjectType) -> Self {
        self.subject_type = subject_type;
        self
    }

    pub fn with_expiry(mut self, expiry: Timestamp) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn with_announcement(mut self, announcement: SubjectAnnouncement) -> Self {
        self.announcement = Some(announcement);
        self
    }

    /// Returns `true` when the subject never expires.
    pub fn is_permanent(&self) -> bool {
        self.expiry.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::timestamp::Timestamp;

    use super::{Subject, SubjectId, SubjectIdError};

    #[test]
    fn subject_id_roundtrip() {
        let id = SubjectId::from_str("google:alice@example.org").unwrap();
        assert_eq!(id.issuer(), "google");
        assert_eq!(id.subject(), "alice@example.org");
        assert_eq!(
            SubjectId::from_str(&id.to_string()).unwrap(),
            id
        );
    }

    #[test]
    fn subject_part_may_contain_colons() {
        let id = SubjectId::from_str("integration:client:device-7").unwrap();
        assert_eq!(id.issuer(), "integration");
        assert_eq!(id.subject(), "client:device-7");
    }

    #[test]
    fn rejects_empty_parts() {
        assert!(matches!(
            SubjectId::from_str(":subject"),
            Err(SubjectIdError::InvalidIssuer(_))
        ));
        assert!(matches!(
            SubjectId::from_str("issuer:"),
            Err(SubjectIdError::InvalidSubject(_))
        ));
        assert!(matches!(
            SubjectId::from_str("no-separator"),
            Err(SubjectIdError::MissingSeparator(_))
        ));
    }

    #[test]
    fn permanence() {
        let id = SubjectId::new("nginx", "operator").unwrap();
        let permanent = Subject::new(id.clone());
        assert!(permanent.is_permanent());

        let expiring = Subject::new(id).with_expiry(Timestamp::from_secs(1000));
        assert!(!expiring.is_permanent());
    }
}
