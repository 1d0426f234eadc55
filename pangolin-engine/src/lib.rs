// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event-sourced runtime for policy entities.
//!
//! Every policy is owned by exactly one actor at a time. The actor validates commands against
//! the live state and the policy invariants, persists at most one event per command, snapshots
//! periodically, recovers from snapshot plus replay on restart, and schedules the time-based
//! side effects of subject expiry: deletion and deletion announcements. Commands, timer
//! wakeups and shutdown all arrive through the same mailbox, so processing is strictly
//! sequential without any locking.
pub mod actor;
pub mod announcement;
pub mod config;
pub mod error;
pub mod expiry;
pub mod notice;
pub mod service;
#[cfg(feature = "test_utils")]
pub mod test_utils;

pub use actor::{PolicyActor, ToPolicyActor};
pub use announcement::{AnnouncementSchedule, AnnouncementTrigger};
pub use config::Config;
pub use error::EngineError;
pub use expiry::ExpirySchedule;
pub use notice::{BroadcastPublisher, LocalNoticePublisher, Notice, NoticePublisher};
pub use service::PolicyService;
