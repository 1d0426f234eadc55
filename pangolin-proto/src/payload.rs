// SPDX-License-Identifier: MIT OR Apache-2.0

//! The protocol envelope.
//!
//! Every message travels as a JSON object with a `topic`, a `headers` map and the
//! criterion-specific payload fields `path`, `value`, `status`, `revision`, `timestamp`,
//! `fields` and `extra`. Absent payload fields are skipped on the wire.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use pangolin_core::{PolicyEvent, PolicyId, SubjectId, Timestamp};

use crate::topic::{TopicPath, TopicPathBuilder, TopicPathError};

/// String-keyed header map of an envelope.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, Value>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: &str, value: Value) {
        self.0.insert(name.to_owned(), value);
    }

    /// The `correlation-id` header, when present and a string.
    pub fn correlation_id(&self) -> Option<&str> {
        self.get("correlation-id").and_then(Value::as_str)
    }

    /// The `response-required` header; absent defaults to `true`.
    pub fn response_required(&self) -> bool {
        self.get("response-required")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }
}

/// Criterion-specific payload fields of an envelope, all optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl Payload {
    pub fn builder() -> PayloadBuilder {
        PayloadBuilder::default()
    }
}

/// Fluent construction of a [`Payload`].
#[derive(Clone, Debug, Default)]
pub struct PayloadBuilder {
    payload: Payload,
}

impl PayloadBuilder {
    pub fn path(mut self, path: &str) -> Self {
        self.payload.path = Some(path.to_owned());
        self
    }

    pub fn value(mut self, value: Value) -> Self {
        self.payload.value = Some(value);
        self
    }

    pub fn status(mut self, status: u16) -> Self {
        self.payload.status = Some(status);
        self
    }

    pub fn revision(mut self, revision: u64) -> Self {
        self.payload.revision = Some(revision);
        self
    }

    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.payload.timestamp = Some(timestamp);
        self
    }

    pub fn fields(mut self, fields: &str) -> Self {
        self.payload.fields = Some(fields.to_owned());
        self
    }

    pub fn extra(mut self, extra: Value) -> Self {
        self.payload.extra = Some(extra);
        self
    }

    pub fn build(self) -> Payload {
        self.payload
    }
}

/// A complete protocol message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: TopicPath,

    #[serde(default)]
    pub headers: Headers,

    #[serde(flatten)]
    pub payload: Payload,
}

impl Envelope {
    pub fn new(topic: TopicPath, payload: Payload) -> Self {
        Self {
            topic,
            headers: Headers::new(),
            payload,
        }
    }

    /// The published form of a persisted policy event.
    ///
    /// The topic is derived from the event's policy id under the `policies` group and `events`
    /// criterion; `path` points at the changed sub-resource, `value` carries its new state.
    pub fn for_event(event: &PolicyEvent) -> Result<Self, EnvelopeError> {
        let events = TopicPathBuilder::from_policy_id(event.policy_id())
            .policies()
            .events();

        let topic = match event.name() {
            "created" => events.created()?,
            "deleted" => events.deleted()?,
            _ => events.modified()?,
        };

        let mut builder = Payload::builder()
            .path(&event.resource_path())
            .revision(event.revision())
            .timestamp(event.timestamp());

        if let Some(value) = event_value(event)? {
            builder = builder.value(value);
        }

        Ok(Self::new(topic, builder.build()))
    }

    /// Announcement that subjects are about to be, or have been, deleted.
    pub fn subject_deletion(
        id: &PolicyId,
        subject_ids: &[SubjectId],
        deleted_at: Timestamp,
    ) -> Result<Self, EnvelopeError> {
        let topic = TopicPathBuilder::from_policy_id(id)
            .policies()
            .announcements("subjectDeletion")?;

        let value = serde_json::json!({
            "subjectIds": subject_ids,
            "deletedAt": deleted_at,
        });

        let payload = Payload::builder()
            .path("/")
            .value(value)
            .timestamp(deleted_at)
            .build();

        Ok(Self::new(topic, payload))
    }
}

/// The envelope `value` of a policy event: the new state of the changed sub-resource, absent
/// for deletions.
fn event_value(event: &PolicyEvent) -> Result<Option<Value>, EnvelopeError> {
    let value = match event {
        PolicyEvent::Created { entries, .. } | PolicyEvent::Modified { entries, .. } => {
            Some(serde_json::to_value(entries)?)
        }
        PolicyEvent::EntryCreated { entry, .. } | PolicyEvent::EntryModified { entry, .. } => {
            Some(serde_json::to_value(entry)?)
        }
        PolicyEvent::SubjectCreated { subject, .. }
        | PolicyEvent::SubjectModified { subject, .. } => Some(serde_json::to_value(subject)?),
        PolicyEvent::SubjectsModified { subjects, .. } => Some(serde_json::to_value(subjects)?),
        PolicyEvent::ResourceCreated { resource, .. }
        | PolicyEvent::ResourceModified { resource, .. } => Some(serde_json::to_value(resource)?),
        PolicyEvent::Deleted { .. }
        | PolicyEvent::EntryDeleted { .. }
        | PolicyEvent::SubjectDeleted { .. }
        | PolicyEvent::ResourceDeleted { .. } => None,
    };

    Ok(value)
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error(transparent)]
    Topic(#[from] TopicPathError),

    #[error("envelope value could not be serialized: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use pangolin_core::{PolicyEvent, PolicyId, SubjectId, Timestamp};
    use serde_json::json;

    use crate::topic::TopicPathBuilder;

    use super::{Envelope, Payload};

    #[test]
    fn absent_payload_fields_are_skipped() {
        let topic = TopicPathBuilder::new("org.example", "policy-1")
            .policies()
            .commands()
            .retrieve()
            .unwrap();

        let envelope = Envelope::new(topic, Payload::default());
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            json,
            json!({
                "topic": "org.example/policy-1/policies/commands/retrieve",
                "headers": {},
            })
        );
    }

    #[test]
    fn envelope_roundtrip() {
        let topic = TopicPathBuilder::new("org.example", "policy-1")
            .policies()
            .events()
            .modified()
            .unwrap();

        let payload = Payload::builder()
            .path("/entries/owner")
            .value(json!({"subjects": {}}))
            .revision(4)
            .timestamp(Timestamp::from_secs(1_700_000_000))
            .build();

        let mut envelope = Envelope::new(topic, payload);
        envelope.headers.insert("correlation-id", json!("abc-123"));
        envelope.headers.insert("response-required", json!(false));

        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: Envelope = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, envelope);
        assert_eq!(parsed.headers.correlation_id(), Some("abc-123"));
        assert!(!parsed.headers.response_required());
    }

    #[test]
    fn event_envelope_points_at_the_change() {
        let id = PolicyId::new("org.example", "policy-1").unwrap();
        let event = PolicyEvent::SubjectDeleted {
            id,
            label: "owner".parse().unwrap(),
            subject_id: SubjectId::new("google", "temp").unwrap(),
            revision: 7,
            timestamp: Timestamp::from_secs(500),
        };

        let envelope = Envelope::for_event(&event).unwrap();
        assert_eq!(
            envelope.topic.to_path(),
            "org.example/policy-1/policies/events/deleted"
        );
        assert_eq!(
            envelope.payload.path.as_deref(),
            Some("/entries/owner/subjects/google:temp")
        );
        assert_eq!(envelope.payload.revision, Some(7));
        assert_eq!(envelope.payload.value, None);
    }

    #[test]
    fn subject_deletion_announcement() {
        let id = PolicyId::new("org.example", "policy-1").unwrap();
        let subject_id = SubjectId::new("google", "temp").unwrap();

        let envelope =
            Envelope::subject_deletion(&id, &[subject_id], Timestamp::from_secs(900)).unwrap();

        assert_eq!(
            envelope.topic.to_path(),
            "org.example/policy-1/policies/announcements/subjectDeletion"
        );
        assert_eq!(
            envelope.payload.value,
            Some(serde_json::json!({
                "subjectIds": ["google:temp"],
                "deletedAt": 900,
            }))
        );
    }
}
