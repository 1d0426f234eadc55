// SPDX-License-Identifier: MIT OR Apache-2.0

//! Staged fluent construction of topic paths.
//!
//! Each stage only exposes the calls which are legal next, so an invalid combination of group,
//! channel, criterion and tail can never be expressed. The terminal calls still re-validate the
//! group/channel invariant through the shared constructor.
use pangolin_core::PolicyId;

use super::{
    Action, Channel, Criterion, Group, SearchAction, StreamingAction, TopicPath, TopicPathError,
    TopicPathTail,
};

/// Entry stage of the builder, holding the address part of the path.
#[derive(Clone, Debug)]
pub struct TopicPathBuilder {
    namespace: String,
    entity_name: String,
}

impl TopicPathBuilder {
    /// Builder for the given namespace and entity name.
    pub fn new(namespace: &str, entity_name: &str) -> Self {
        Self {
            namespace: namespace.to_owned(),
            entity_name: entity_name.to_owned(),
        }
    }

    /// Builder addressing a policy entity, deriving namespace and entity name from its id.
    pub fn from_policy_id(id: &PolicyId) -> Self {
        Self::new(id.namespace(), id.name())
    }

    /// Builder addressing a whole namespace; the entity name becomes the wildcard placeholder.
    pub fn from_namespace(namespace: &str) -> Self {
        Self::new(namespace, TopicPath::ENTITY_PLACEHOLDER)
    }

    /// A `things` topic; a channel must be picked next.
    pub fn things(self) -> ThingsStage {
        ThingsStage { builder: self }
    }

    /// A `policies` topic; the channel is fixed to none.
    pub fn policies(self) -> CriterionStage {
        CriterionStage {
            builder: self,
            group: Group::Policies,
            channel: Channel::None,
        }
    }

    /// A `connections` topic; the channel is fixed to none.
    pub fn connections(self) -> CriterionStage {
        CriterionStage {
            builder: self,
            group: Group::Connections,
            channel: Channel::None,
        }
    }
}

/// Channel selection stage, only reachable for the `things` group.
#[derive(Clone, Debug)]
pub struct ThingsStage {
    builder: TopicPathBuilder,
}

impl ThingsStage {
    pub fn twin(self) -> CriterionStage {
        CriterionStage {
            builder: self.builder,
            group: Group::Things,
            channel: Channel::Twin,
        }
    }

    pub fn live(self) -> CriterionStage {
        CriterionStage {
            builder: self.builder,
            group: Group::Things,
            channel: Channel::Live,
        }
    }
}

/// Criterion selection stage.
#[derive(Clone, Debug)]
pub struct CriterionStage {
    builder: TopicPathBuilder,
    group: Group,
    channel: Channel,
}

impl CriterionStage {
    pub fn commands(self) -> CommandStage {
        CommandStage { inner: self }
    }

    pub fn events(self) -> EventStage {
        EventStage { inner: self }
    }

    pub fn search(self) -> SearchStage {
        SearchStage { inner: self }
    }

    /// A `streaming` topic carrying the originating command's logical name.
    pub fn streaming(self, name: &str) -> Result<TopicPath, TopicPathError> {
        let action = StreamingAction::new(name)?;
        self.finish(Criterion::Streaming, TopicPathTail::Streaming(action))
    }

    pub fn errors(self) -> Result<TopicPath, TopicPathError> {
        self.finish(Criterion::Errors, TopicPathTail::None)
    }

    pub fn messages(self, subject: &str) -> Result<TopicPath, TopicPathError> {
        self.finish(
            Criterion::Messages,
            TopicPathTail::Subject(Some(subject.to_owned())),
        )
    }

    /// An `acks` topic; an absent subject addresses aggregated acknowledgements.
    pub fn acks(self, subject: Option<&str>) -> Result<TopicPath, TopicPathError> {
        self.finish(
            Criterion::Acks,
            TopicPathTail::Subject(subject.map(ToOwned::to_owned)),
        )
    }

    pub fn announcements(self, subject: &str) -> Result<TopicPath, TopicPathError> {
        self.finish(
            Criterion::Announcements,
            TopicPathTail::Subject(Some(subject.to_owned())),
        )
    }

    fn finish(
        self,
        criterion: Criterion,
        tail: TopicPathTail,
    ) -> Result<TopicPath, TopicPathError> {
        TopicPath::from_parts(
            self.builder.namespace,
            self.builder.entity_name,
            self.group,
            self.channel,
            criterion,
            tail,
        )
    }
}

/// Command action stage.
#[derive(Clone, Debug)]
pub struct CommandStage {
    inner: CriterionStage,
}

impl CommandStage {
    pub fn create(self) -> Result<TopicPath, TopicPathError> {
        self.finish(Action::Create)
    }

    pub fn retrieve(self) -> Result<TopicPath, TopicPathError> {
        self.finish(Action::Retrieve)
    }

    pub fn modify(self) -> Result<TopicPath, TopicPathError> {
        self.finish(Action::Modify)
    }

    pub fn merge(self) -> Result<TopicPath, TopicPathError> {
        self.finish(Action::Merge)
    }

    pub fn delete(self) -> Result<TopicPath, TopicPathError> {
        self.finish(Action::Delete)
    }

    fn finish(self, action: Action) -> Result<TopicPath, TopicPathError> {
        self.inner
            .finish(Criterion::Commands, TopicPathTail::Action(action))
    }
}

/// Event action stage.
#[derive(Clone, Debug)]
pub struct EventStage {
    inner: CriterionStage,
}

impl EventStage {
    pub fn created(self) -> Result<TopicPath, TopicPathError> {
        self.finish(Action::Created)
    }

    pub fn modified(self) -> Result<TopicPath, TopicPathError> {
        self.finish(Action::Modified)
    }

    pub fn merged(self) -> Result<TopicPath, TopicPathError> {
        self.finish(Action::Merged)
    }

    pub fn deleted(self) -> Result<TopicPath, TopicPathError> {
        self.finish(Action::Deleted)
    }

    fn finish(self, action: Action) -> Result<TopicPath, TopicPathError> {
        self.inner
            .finish(Criterion::Events, TopicPathTail::Action(action))
    }
}

/// Search action stage.
#[derive(Clone, Debug)]
pub struct SearchStage {
    inner: CriterionStage,
}

impl SearchStage {
    pub fn subscribe(self) -> Result<TopicPath, TopicPathError> {
        self.finish(SearchAction::Subscribe)
    }

    pub fn request(self) -> Result<TopicPath, TopicPathError> {
        self.finish(SearchAction::Request)
    }

    pub fn cancel(self) -> Result<TopicPath, TopicPathError> {
        self.finish(SearchAction::Cancel)
    }

    pub fn complete(self) -> Result<TopicPath, TopicPathError> {
        self.finish(SearchAction::Complete)
    }

    pub fn failed(self) -> Result<TopicPath, TopicPathError> {
        self.finish(SearchAction::Failed)
    }

    pub fn next(self) -> Result<TopicPath, TopicPathError> {
        self.finish(SearchAction::Next)
    }

    pub fn generated(self) -> Result<TopicPath, TopicPathError> {
        self.finish(SearchAction::Generated)
    }

    pub fn error(self) -> Result<TopicPath, TopicPathError> {
        self.finish(SearchAction::Error)
    }

    fn finish(self, action: SearchAction) -> Result<TopicPath, TopicPathError> {
        self.inner
            .finish(Criterion::Search, TopicPathTail::Search(action))
    }
}
