// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire addressing for the policy protocol.
//!
//! Every protocol message is routed by a slash-delimited topic path encoding namespace, entity
//! name, group, channel, criterion and a criterion-dependent tail. This crate provides the
//! strongly-typed [`TopicPath`] model, its positional parser, a staged builder which only
//! permits valid combinations, and the JSON envelope every message travels in.
pub mod payload;
pub mod topic;

pub use payload::{Envelope, EnvelopeError, Headers, Payload, PayloadBuilder};
pub use topic::{
    Action, Channel, Criterion, Group, SearchAction, StreamingAction, TopicPath, TopicPathBuilder,
    TopicPathError, TopicPathTail,
};
