// SPDX-License-Identifier: MIT OR Apache-2.0

//! The strongly-typed topic-path model.
//!
//! A topic path addresses every protocol message with the segments
//! `namespace/entityName/group/channel/criterion/action[/subject]`, joined by slashes. The
//! channel segment only appears for the `things` group; `policies` and `connections` topics
//! never carry one. Which tail follows the criterion depends on the criterion itself, the
//! alternatives are mutually exclusive by construction.
mod builder;
mod parse;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pangolin_core::{PolicyId, PolicyIdError};

pub use builder::{
    CommandStage, CriterionStage, EventStage, SearchStage, ThingsStage, TopicPathBuilder,
};

/// Entity group a topic addresses.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Things,
    Policies,
    Connections,
}

impl Group {
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Things => "things",
            Group::Policies => "policies",
            Group::Connections => "connections",
        }
    }

    /// Only `things` topics distinguish the twin and live channels.
    pub fn requires_channel(&self) -> bool {
        matches!(self, Group::Things)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Communication channel of a `things` topic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Twin,
    Live,
    /// No channel segment on the wire; fixed for `policies` and `connections` topics.
    None,
}

impl Channel {
    /// Wire segment of the channel, absent for [`Channel::None`].
    pub fn segment(&self) -> Option<&'static str> {
        match self {
            Channel::Twin => Some("twin"),
            Channel::Live => Some("live"),
            Channel::None => None,
        }
    }
}

/// Criterion of a topic, selecting which kind of signal the message carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Commands,
    Events,
    Search,
    Messages,
    Errors,
    Acks,
    Announcements,
    Streaming,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Commands => "commands",
            Criterion::Events => "events",
            Criterion::Search => "search",
            Criterion::Messages => "messages",
            Criterion::Errors => "errors",
            Criterion::Acks => "acks",
            Criterion::Announcements => "announcements",
            Criterion::Streaming => "streaming",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Action of a command or event topic.
///
/// The first five members are valid for the `commands` criterion, the remaining four for
/// `events`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Retrieve,
    Modify,
    Merge,
    Delete,
    Created,
    Modified,
    Merged,
    Deleted,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Retrieve => "retrieve",
            Action::Modify => "modify",
            Action::Merge => "merge",
            Action::Delete => "delete",
            Action::Created => "created",
            Action::Modified => "modified",
            Action::Merged => "merged",
            Action::Deleted => "deleted",
        }
    }

    pub fn is_command_action(&self) -> bool {
        matches!(
            self,
            Action::Create | Action::Retrieve | Action::Modify | Action::Merge | Action::Delete
        )
    }

    pub fn is_event_action(&self) -> bool {
        !self.is_command_action()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Action of a `search` topic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchAction {
    Subscribe,
    Request,
    Cancel,
    Complete,
    Failed,
    Next,
    Generated,
    Error,
}

impl SearchAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchAction::Subscribe => "subscribe",
            SearchAction::Request => "request",
            SearchAction::Cancel => "cancel",
            SearchAction::Complete => "complete",
            SearchAction::Failed => "failed",
            SearchAction::Next => "next",
            SearchAction::Generated => "generated",
            SearchAction::Error => "error",
        }
    }
}

impl fmt::Display for SearchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Action of a `streaming` topic.
///
/// Streaming actions carry the logical name of the originating command verbatim rather than a
/// fixed enum member, the set of names is open-ended on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamingAction(String);

impl StreamingAction {
    /// Validated construction: the token must be non-empty and free of slashes.
    pub fn new(name: &str) -> Result<Self, TopicPathError> {
        if name.is_empty() || name.contains(TopicPath::SEPARATOR) {
            return Err(TopicPathError::InvalidStreamingAction {
                name: name.to_owned(),
            });
        }
        Ok(Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StreamingAction {
    type Error = TopicPathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<StreamingAction> for String {
    fn from(value: StreamingAction) -> Self {
        value.0
    }
}

impl fmt::Display for StreamingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Criterion-dependent tail of a topic path.
///
/// Exactly one alternative is present per path, selected by the criterion; mutual exclusion is
/// structural.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TopicPathTail {
    /// `commands` and `events` topics carry one action token.
    Action(Action),

    /// `search` topics carry one search action token.
    Search(SearchAction),

    /// `streaming` topics carry the originating command's logical name.
    Streaming(StreamingAction),

    /// `messages`, `acks` and `announcements` topics carry a free-form subject; an absent
    /// subject is only valid for `acks` and means aggregated acknowledgements.
    Subject(Option<String>),

    /// `errors` topics carry no tail.
    None,
}

/// The routing address of a protocol message.
///
/// Construct through [`TopicPath::builder`] entry points or by parsing a wire string; both
/// routes enforce the group/channel invariant and the per-criterion tail. `to_path()` and the
/// parser are exact inverses.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicPath {
    namespace: String,
    entity_name: String,
    group: Group,
    channel: Channel,
    criterion: Criterion,
    tail: TopicPathTail,
}

impl TopicPath {
    /// Placeholder entity name addressing no particular entity of a namespace.
    pub const ENTITY_PLACEHOLDER: &'static str = "_";

    pub(crate) const SEPARATOR: char = '/';

    /// Validated construction from parts; the builder and parser both funnel through here.
    pub(crate) fn from_parts(
        namespace: String,
        entity_name: String,
        group: Group,
        channel: Channel,
        criterion: Criterion,
        tail: TopicPathTail,
    ) -> Result<Self, TopicPathError> {
        if namespace.is_empty() || namespace.contains(Self::SEPARATOR) {
            return Err(TopicPathError::EmptySegment { part: "namespace" });
        }

        if entity_name.is_empty() || entity_name.contains(Self::SEPARATOR) {
            return Err(TopicPathError::EmptySegment {
                part: "entity name",
            });
        }

        match (group.requires_channel(), channel) {
            (true, Channel::None) => return Err(TopicPathError::ChannelRequired { group }),
            (false, Channel::Twin | Channel::Live) => {
                return Err(TopicPathError::ChannelNotAllowed { group });
            }
            _ => {}
        }

        // An empty subject string is the absent subject; normalizing here keeps the builder,
        // the parser and `to_path` in agreement about its wire form.
        let tail = match tail {
            TopicPathTail::Subject(Some(subject)) if subject.is_empty() => {
                TopicPathTail::Subject(None)
            }
            tail => tail,
        };

        let tail_matches = match criterion {
            Criterion::Commands => {
                matches!(&tail, TopicPathTail::Action(action) if action.is_command_action())
            }
            Criterion::Events => {
                matches!(&tail, TopicPathTail::Action(action) if action.is_event_action())
            }
            Criterion::Search => matches!(&tail, TopicPathTail::Search(_)),
            Criterion::Streaming => matches!(&tail, TopicPathTail::Streaming(_)),
            Criterion::Errors => matches!(&tail, TopicPathTail::None),
            Criterion::Messages | Criterion::Announcements => {
                matches!(&tail, TopicPathTail::Subject(Some(_)))
            }
            Criterion::Acks => matches!(
                &tail,
                TopicPathTail::Subject(None) | TopicPathTail::Subject(Some(_))
            ),
        };

        if !tail_matches {
            return Err(TopicPathError::TailMismatch { criterion });
        }

        Ok(Self {
            namespace,
            entity_name,
            group,
            channel,
            criterion,
            tail,
        })
    }

    /// Builder seeded with this path's namespace and entity name.
    pub fn builder(&self) -> TopicPathBuilder {
        TopicPathBuilder::new(&self.namespace, &self.entity_name)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn group(&self) -> Group {
        self.group
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn criterion(&self) -> Criterion {
        self.criterion
    }

    pub fn tail(&self) -> &TopicPathTail {
        &self.tail
    }

    /// The action, when the criterion is `commands` or `events`.
    pub fn action(&self) -> Option<Action> {
        match &self.tail {
            TopicPathTail::Action(action) => Some(*action),
            _ => None,
        }
    }

    /// The search action, when the criterion is `search`.
    pub fn search_action(&self) -> Option<SearchAction> {
        match &self.tail {
            TopicPathTail::Search(action) => Some(*action),
            _ => None,
        }
    }

    /// The streaming action, when the criterion is `streaming`.
    pub fn streaming_action(&self) -> Option<&StreamingAction> {
        match &self.tail {
            TopicPathTail::Streaming(action) => Some(action),
            _ => None,
        }
    }

    /// The free-form subject, when present.
    pub fn subject(&self) -> Option<&str> {
        match &self.tail {
            TopicPathTail::Subject(subject) => subject.as_deref(),
            _ => None,
        }
    }

    /// Join all present parts with slashes; the exact inverse of parsing.
    pub fn to_path(&self) -> String {
        let mut path = format!("{}/{}/{}", self.namespace, self.entity_name, self.group);

        if let Some(channel) = self.channel.segment() {
            path.push(Self::SEPARATOR);
            path.push_str(channel);
        }

        path.push(Self::SEPARATOR);
        path.push_str(self.criterion.as_str());

        match &self.tail {
            TopicPathTail::Action(action) => {
                path.push(Self::SEPARATOR);
                path.push_str(action.as_str());
            }
            TopicPathTail::Search(action) => {
                path.push(Self::SEPARATOR);
                path.push_str(action.as_str());
            }
            TopicPathTail::Streaming(action) => {
                path.push(Self::SEPARATOR);
                path.push_str(action.as_str());
            }
            TopicPathTail::Subject(Some(subject)) => {
                path.push(Self::SEPARATOR);
                path.push_str(subject);
            }
            TopicPathTail::Subject(None) | TopicPathTail::None => {}
        }

        path
    }
}

impl fmt::Display for TopicPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_path())
    }
}

impl TryFrom<String> for TopicPath {
    type Error = TopicPathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TopicPath> for String {
    fn from(value: TopicPath) -> Self {
        value.to_path()
    }
}

/// Routing-key derivation: the policy entity a topic addresses.
///
/// Fails for the wildcard entity placeholder and for entity names which are no valid policy
/// names.
impl TryFrom<&TopicPath> for PolicyId {
    type Error = TopicPathError;

    fn try_from(topic: &TopicPath) -> Result<Self, Self::Error> {
        if topic.entity_name() == TopicPath::ENTITY_PLACEHOLDER {
            return Err(TopicPathError::EntityPlaceholder);
        }

        Ok(PolicyId::new(topic.namespace(), topic.entity_name())?)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopicPathError {
    /// The path ended before a required positional part.
    #[error("topic path {path} is missing its {part} part")]
    MissingPart { part: &'static str, path: String },

    /// A positional segment which must carry a value is empty.
    #[error("topic path segment {part} must not be empty")]
    EmptySegment { part: &'static str },

    #[error("unknown topic group: {name} in {path}")]
    UnknownGroup { name: String, path: String },

    #[error("unknown topic channel: {name} in {path}")]
    UnknownChannel { name: String, path: String },

    #[error("unknown topic criterion: {name} in {path}")]
    UnknownCriterion { name: String, path: String },

    #[error("unknown {criterion} action: {name} in {path}")]
    UnknownAction {
        name: String,
        criterion: Criterion,
        path: String,
    },

    /// Tokens remained after the criterion's complete tail.
    #[error("trailing segments after complete topic path: {path}")]
    TrailingSegments { path: String },

    /// A `things` topic was constructed without a twin or live channel.
    #[error("topic group {group} requires a channel")]
    ChannelRequired { group: Group },

    /// A `policies` or `connections` topic was constructed with a channel.
    #[error("topic group {group} does not allow a channel")]
    ChannelNotAllowed { group: Group },

    /// The tail alternative does not fit the criterion.
    #[error("topic tail does not match criterion {criterion}")]
    TailMismatch { criterion: Criterion },

    #[error("invalid streaming action: {name}")]
    InvalidStreamingAction { name: String },

    /// The topic addresses the wildcard entity placeholder, no policy id can be derived.
    #[error("topic entity name is the wildcard placeholder")]
    EntityPlaceholder,

    #[error(transparent)]
    Id(#[from] PolicyIdError),
}
