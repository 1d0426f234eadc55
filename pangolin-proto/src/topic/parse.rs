// SPDX-License-Identifier: MIT OR Apache-2.0

//! Positional parser for topic-path wire strings.
use std::str::FromStr;

use super::{
    Action, Channel, Criterion, Group, SearchAction, StreamingAction, TopicPath, TopicPathError,
    TopicPathTail,
};

/// Cursor over the slash-separated segments of a path.
///
/// Segments are consumed left to right in fixed positional order; exhaustion where a part is
/// required reports which part was missing.
struct Segments<'a> {
    path: &'a str,
    iter: std::str::Split<'a, char>,
}

impl<'a> Segments<'a> {
    fn new(path: &'a str) -> Self {
        Self {
            path,
            iter: path.split(TopicPath::SEPARATOR),
        }
    }

    fn next(&mut self, part: &'static str) -> Result<&'a str, TopicPathError> {
        self.iter.next().ok_or(TopicPathError::MissingPart {
            part,
            path: self.path.to_owned(),
        })
    }

    /// Remaining segments rejoined with slashes; `None` when exhausted.
    ///
    /// Empty segments are kept, so a subject whose first segment is empty (a JSON-pointer-style
    /// path such as `/door/open`) survives the rejoin.
    fn rest(mut self) -> Option<String> {
        let mut rest = self.iter.next()?.to_owned();
        for segment in self.iter {
            rest.push(TopicPath::SEPARATOR);
            rest.push_str(segment);
        }
        Some(rest)
    }

    /// Fails when any segment is left over.
    fn expect_exhausted(mut self) -> Result<(), TopicPathError> {
        match self.iter.next() {
            Some(_) => Err(TopicPathError::TrailingSegments {
                path: self.path.to_owned(),
            }),
            None => Ok(()),
        }
    }
}

impl FromStr for TopicPath {
    type Err = TopicPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Segments::new(s);

        // A path starting with a slash yields an artificial empty first segment, which shows up
        // here as an empty namespace. The leading-slash convention belongs to JSON-pointer
        // resource paths, not to topic segments.
        let namespace = segments.next("namespace")?.to_owned();
        let entity_name = segments.next("entity name")?.to_owned();

        let group_name = segments.next("group")?;
        let group = match group_name {
            "things" => Group::Things,
            "policies" => Group::Policies,
            "connections" => Group::Connections,
            other => {
                return Err(TopicPathError::UnknownGroup {
                    name: other.to_owned(),
                    path: s.to_owned(),
                });
            }
        };

        // The channel position only exists for the things group.
        let channel = if group.requires_channel() {
            let channel_name = segments.next("channel")?;
            match channel_name {
                "twin" => Channel::Twin,
                "live" => Channel::Live,
                other => {
                    return Err(TopicPathError::UnknownChannel {
                        name: other.to_owned(),
                        path: s.to_owned(),
                    });
                }
            }
        } else {
            Channel::None
        };

        let criterion_name = segments.next("criterion")?;
        let criterion = match criterion_name {
            "commands" => Criterion::Commands,
            "events" => Criterion::Events,
            "search" => Criterion::Search,
            "messages" => Criterion::Messages,
            "errors" => Criterion::Errors,
            "acks" => Criterion::Acks,
            "announcements" => Criterion::Announcements,
            "streaming" => Criterion::Streaming,
            other => {
                return Err(TopicPathError::UnknownCriterion {
                    name: other.to_owned(),
                    path: s.to_owned(),
                });
            }
        };

        let tail = match criterion {
            Criterion::Commands | Criterion::Events => {
                let name = segments.next("action")?;
                let action = parse_action(name, criterion, s)?;
                segments.expect_exhausted()?;
                TopicPathTail::Action(action)
            }
            Criterion::Search => {
                let name = segments.next("search action")?;
                let action = match name {
                    "subscribe" => SearchAction::Subscribe,
                    "request" => SearchAction::Request,
                    "cancel" => SearchAction::Cancel,
                    "complete" => SearchAction::Complete,
                    "failed" => SearchAction::Failed,
                    "next" => SearchAction::Next,
                    "generated" => SearchAction::Generated,
                    "error" => SearchAction::Error,
                    other => {
                        return Err(TopicPathError::UnknownAction {
                            name: other.to_owned(),
                            criterion,
                            path: s.to_owned(),
                        });
                    }
                };
                segments.expect_exhausted()?;
                TopicPathTail::Search(action)
            }
            Criterion::Streaming => {
                let name = segments.next("streaming action")?;
                let action = StreamingAction::new(name)?;
                segments.expect_exhausted()?;
                TopicPathTail::Streaming(action)
            }
            Criterion::Errors => {
                segments.expect_exhausted()?;
                TopicPathTail::None
            }
            Criterion::Messages | Criterion::Acks | Criterion::Announcements => {
                match segments.rest().filter(|subject| !subject.is_empty()) {
                    Some(subject) => TopicPathTail::Subject(Some(subject)),
                    // An absent subject means aggregated acknowledgements and is only valid for
                    // the acks criterion; messages and announcements require one.
                    None if criterion == Criterion::Acks => TopicPathTail::Subject(None),
                    None => {
                        return Err(TopicPathError::MissingPart {
                            part: "subject",
                            path: s.to_owned(),
                        });
                    }
                }
            }
        };

        TopicPath::from_parts(namespace, entity_name, group, channel, criterion, tail)
    }
}

/// Look an action token up in the per-criterion action set.
fn parse_action(name: &str, criterion: Criterion, path: &str) -> Result<Action, TopicPathError> {
    let action = match name {
        "create" => Some(Action::Create),
        "retrieve" => Some(Action::Retrieve),
        "modify" => Some(Action::Modify),
        "merge" => Some(Action::Merge),
        "delete" => Some(Action::Delete),
        "created" => Some(Action::Created),
        "modified" => Some(Action::Modified),
        "merged" => Some(Action::Merged),
        "deleted" => Some(Action::Deleted),
        _ => None,
    };

    match (criterion, action) {
        (Criterion::Commands, Some(action)) if action.is_command_action() => Ok(action),
        (Criterion::Events, Some(action)) if action.is_event_action() => Ok(action),
        _ => Err(TopicPathError::UnknownAction {
            name: name.to_owned(),
            criterion,
            path: path.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::super::{
        Action, Channel, Criterion, Group, SearchAction, TopicPath, TopicPathError,
    };

    #[test]
    fn parses_a_policy_command_topic() {
        let topic: TopicPath = "org.example/policy-1/policies/commands/modify"
            .parse()
            .unwrap();

        assert_eq!(topic.namespace(), "org.example");
        assert_eq!(topic.entity_name(), "policy-1");
        assert_eq!(topic.group(), Group::Policies);
        assert_eq!(topic.channel(), Channel::None);
        assert_eq!(topic.criterion(), Criterion::Commands);
        assert_eq!(topic.action(), Some(Action::Modify));
    }

    #[test]
    fn parses_a_things_twin_event_topic() {
        let topic: TopicPath = "org.example/thing-1/things/twin/events/created"
            .parse()
            .unwrap();

        assert_eq!(topic.group(), Group::Things);
        assert_eq!(topic.channel(), Channel::Twin);
        assert_eq!(topic.action(), Some(Action::Created));
    }

    #[test]
    fn parses_search_and_streaming_topics() {
        let search: TopicPath = "org.example/thing-1/things/twin/search/subscribe"
            .parse()
            .unwrap();
        assert_eq!(search.search_action(), Some(SearchAction::Subscribe));

        let streaming: TopicPath =
            "org.example/policy-1/policies/streaming/subscribeForPersistedEvents"
                .parse()
                .unwrap();
        assert_eq!(
            streaming.streaming_action().unwrap().as_str(),
            "subscribeForPersistedEvents"
        );
    }

    #[test]
    fn message_subjects_keep_their_slashes() {
        let topic: TopicPath = "org.example/thing-1/things/live/messages/door/open"
            .parse()
            .unwrap();

        assert_eq!(topic.subject(), Some("door/open"));
        assert_eq!(
            topic.to_path(),
            "org.example/thing-1/things/live/messages/door/open"
        );
    }

    #[test]
    fn subjects_keep_a_leading_empty_segment() {
        let topic: TopicPath = "org.example/thing-1/things/live/messages//door/open"
            .parse()
            .unwrap();

        assert_eq!(topic.subject(), Some("/door/open"));
        assert_eq!(
            topic.to_path(),
            "org.example/thing-1/things/live/messages//door/open"
        );
    }

    #[test]
    fn empty_ack_subject_means_aggregated() {
        let topic: TopicPath = "org.example/thing-1/things/twin/acks".parse().unwrap();
        assert_eq!(topic.subject(), None);
        assert_eq!(topic.to_path(), "org.example/thing-1/things/twin/acks");

        let trailing: TopicPath = "org.example/thing-1/things/twin/acks/".parse().unwrap();
        assert_eq!(trailing.subject(), None);
        assert_eq!(trailing, topic);

        let labelled: TopicPath = "org.example/thing-1/things/twin/acks/custom"
            .parse()
            .unwrap();
        assert_eq!(labelled.subject(), Some("custom"));
    }

    #[test]
    fn errors_topics_have_no_tail() {
        let topic: TopicPath = "org.example/thing-1/things/twin/errors".parse().unwrap();
        assert_eq!(topic.criterion(), Criterion::Errors);

        assert_matches!(
            "org.example/thing-1/things/twin/errors/extra".parse::<TopicPath>(),
            Err(TopicPathError::TrailingSegments { .. })
        );
    }

    #[test]
    fn rejection_table() {
        // Missing positional parts name the part.
        assert_matches!(
            "org.example/policy-1/policies".parse::<TopicPath>(),
            Err(TopicPathError::MissingPart {
                part: "criterion",
                ..
            })
        );
        assert_matches!(
            "org.example/policy-1/policies/commands".parse::<TopicPath>(),
            Err(TopicPathError::MissingPart { part: "action", .. })
        );
        assert_matches!(
            "org.example/thing-1/things".parse::<TopicPath>(),
            Err(TopicPathError::MissingPart {
                part: "channel",
                ..
            })
        );

        // Unknown tokens.
        assert_matches!(
            "org.example/policy-1/widgets/commands/modify".parse::<TopicPath>(),
            Err(TopicPathError::UnknownGroup { .. })
        );
        assert_matches!(
            "org.example/thing-1/things/shadow/events/created".parse::<TopicPath>(),
            Err(TopicPathError::UnknownChannel { .. })
        );
        assert_matches!(
            "org.example/policy-1/policies/gossip/modify".parse::<TopicPath>(),
            Err(TopicPathError::UnknownCriterion { .. })
        );

        // Event actions are invalid for commands and vice versa.
        assert_matches!(
            "org.example/policy-1/policies/commands/created".parse::<TopicPath>(),
            Err(TopicPathError::UnknownAction {
                criterion: Criterion::Commands,
                ..
            })
        );
        assert_matches!(
            "org.example/policy-1/policies/events/retrieve".parse::<TopicPath>(),
            Err(TopicPathError::UnknownAction {
                criterion: Criterion::Events,
                ..
            })
        );

        // A channel segment on a policies topic parses as an unknown criterion.
        assert_matches!(
            "org.example/policy-1/policies/twin/commands/modify".parse::<TopicPath>(),
            Err(TopicPathError::UnknownCriterion { .. })
        );

        // Messages require a subject; a bare trailing slash does not provide one.
        assert_matches!(
            "org.example/thing-1/things/live/messages".parse::<TopicPath>(),
            Err(TopicPathError::MissingPart {
                part: "subject",
                ..
            })
        );
        assert_matches!(
            "org.example/thing-1/things/live/messages/".parse::<TopicPath>(),
            Err(TopicPathError::MissingPart {
                part: "subject",
                ..
            })
        );
    }

    #[test]
    fn leading_slash_is_an_empty_namespace() {
        assert_matches!(
            "/thing-1/things/twin/errors".parse::<TopicPath>(),
            Err(TopicPathError::EmptySegment { part: "namespace" })
        );
    }
}
