// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime configuration for policy actors.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pangolin_core::ExpiryGranularity;

/// Default upper bound for the CBOR-encoded size of a policy.
pub const DEFAULT_MAX_POLICY_SIZE: usize = 100 * 1024;

/// Default number of events since the last snapshot after which the next persisted event
/// triggers a new one.
pub const DEFAULT_SNAPSHOT_THRESHOLD: u64 = 100;

/// Default wall-clock interval for time-triggered snapshots.
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default interval between actor activity checks.
pub const DEFAULT_ACTIVITY_CHECK_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Default number of consecutive idle activity checks before an actor requests passivation.
pub const DEFAULT_MAX_IDLE_CHECKS: u32 = 2;

/// Default capacity of a policy actor's mailbox.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Configuration of the policy runtime.
///
/// The expiry granularity has no default and must be passed explicitly; all other parameters
/// start from their defaults and can be overridden fluently.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Scheduling granularity subject expiries are rounded up to.
    pub expiry_granularity: ExpiryGranularity,

    /// Upper bound for the CBOR-encoded size of a policy in bytes.
    pub max_policy_size: usize,

    /// Number of events since the last snapshot after which the next persisted event triggers
    /// a new one.
    pub snapshot_threshold: u64,

    /// Wall-clock interval for time-triggered snapshots; only snapshots when there were
    /// changes since the last one.
    pub snapshot_interval: Duration,

    /// Interval between activity checks of an idle actor.
    pub activity_check_interval: Duration,

    /// Number of consecutive idle activity checks at which an actor requests passivation.
    pub max_idle_checks: u32,

    /// Capacity of a policy actor's mailbox.
    pub mailbox_capacity: usize,
}

impl Config {
    pub fn new(expiry_granularity: ExpiryGranularity) -> Self {
        Self {
            expiry_granularity,
            max_policy_size: DEFAULT_MAX_POLICY_SIZE,
            snapshot_threshold: DEFAULT_SNAPSHOT_THRESHOLD,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            activity_check_interval: DEFAULT_ACTIVITY_CHECK_INTERVAL,
            max_idle_checks: DEFAULT_MAX_IDLE_CHECKS,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }

    pub fn with_max_policy_size(mut self, max_policy_size: usize) -> Self {
        self.max_policy_size = max_policy_size;
        self
    }

    pub fn with_snapshot_threshold(mut self, snapshot_threshold: u64) -> Self {
        self.snapshot_threshold = snapshot_threshold;
        self
    }

    pub fn with_snapshot_interval(mut self, snapshot_interval: Duration) -> Self {
        self.snapshot_interval = snapshot_interval;
        self
    }

    pub fn with_activity_check_interval(mut self, activity_check_interval: Duration) -> Self {
        self.activity_check_interval = activity_check_interval;
        self
    }

    pub fn with_max_idle_checks(mut self, max_idle_checks: u32) -> Self {
        self.max_idle_checks = max_idle_checks;
        self
    }

    pub fn with_mailbox_capacity(mut self, mailbox_capacity: usize) -> Self {
        self.mailbox_capacity = mailbox_capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pangolin_core::ExpiryGranularity;

    use super::{Config, DEFAULT_SNAPSHOT_THRESHOLD};

    #[test]
    fn fluent_overrides() {
        let granularity = ExpiryGranularity::new(10).unwrap();
        let config = Config::new(granularity)
            .with_snapshot_interval(Duration::from_secs(30))
            .with_max_idle_checks(5);

        assert_eq!(config.expiry_granularity, granularity);
        assert_eq!(config.snapshot_interval, Duration::from_secs(30));
        assert_eq!(config.max_idle_checks, 5);
        assert_eq!(config.snapshot_threshold, DEFAULT_SNAPSHOT_THRESHOLD);
    }
}
