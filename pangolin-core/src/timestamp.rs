// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wall-clock timestamps and the expiry rounding rule.
use std::fmt::Display;
use std::hash::Hash as StdHash;
use std::num::ParseIntError;
use std::ops::{Add, Sub};
use std::str::FromStr;
use std::time::Duration;
#[cfg(not(test))]
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(test)]
use mock_instant::thread_local::{SystemTime, UNIX_EPOCH};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Seconds since the UNIX epoch based on system time.
///
/// Policy revisions and subject expiries operate on whole-second precision; sub-second accuracy
/// gains nothing once expiries are rounded to a scheduling granularity anyway.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, StdHash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Timestamp from whole seconds since the UNIX epoch.
    pub fn from_secs(value: u64) -> Self {
        Self(value)
    }

    /// Current system time.
    pub fn now() -> Self {
        let now = SystemTime::now();
        let duration = now
            .duration_since(UNIX_EPOCH)
            .expect("system time went backwards");
        Self(duration.as_secs())
    }

    /// Seconds since the UNIX epoch.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Round up to the next multiple of the given granularity.
    ///
    /// Timestamps already on a boundary are left unchanged, which makes rounding idempotent. The
    /// result is never smaller than the original timestamp.
    pub fn round_up_to(&self, granularity: ExpiryGranularity) -> Self {
        let g = granularity.as_secs() as u64;
        Self(self.0.saturating_add((g - self.0 % g) % g))
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for u64 {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0.saturating_add(rhs.as_secs()))
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Self::Output {
        Self(self.0.saturating_sub(rhs.as_secs()))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Timestamp {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u64::from_str(s)?))
    }
}

/// Scheduling granularity for subject expiries in whole seconds.
///
/// Expiry timestamps are rounded up to the next multiple of this value at the moment they are
/// set, so that subjects expiring close together share a single scheduler wakeup. There is no
/// default; the granularity is an explicit configuration decision.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ExpiryGranularity(u32);

impl ExpiryGranularity {
    /// Validated construction, rejects a zero granularity.
    pub fn new(secs: u32) -> Result<Self, GranularityError> {
        if secs == 0 {
            return Err(GranularityError::Zero);
        }
        Ok(Self(secs))
    }

    /// Granularity in whole seconds.
    pub fn as_secs(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for ExpiryGranularity {
    type Error = GranularityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExpiryGranularity> for u32 {
    fn from(value: ExpiryGranularity) -> Self {
        value.0
    }
}

impl Display for ExpiryGranularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GranularityError {
    #[error("expiry granularity must be at least one second")]
    Zero,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::time::Duration;

    use mock_instant::thread_local::MockClock;

    use super::{ExpiryGranularity, GranularityError, Timestamp};

    #[test]
    fn now_follows_mock_clock() {
        MockClock::set_system_time(Duration::from_secs(120));
        assert_eq!(Timestamp::now(), Timestamp::from_secs(120));

        MockClock::advance_system_time(Duration::from_secs(5));
        assert_eq!(Timestamp::now(), Timestamp::from_secs(125));
    }

    #[test]
    fn round_up_to_next_boundary() {
        let granularity = ExpiryGranularity::new(10).unwrap();

        assert_eq!(
            Timestamp::from_secs(1).round_up_to(granularity),
            Timestamp::from_secs(10)
        );
        assert_eq!(
            Timestamp::from_secs(11).round_up_to(granularity),
            Timestamp::from_secs(20)
        );
        assert_eq!(
            Timestamp::from_secs(19).round_up_to(granularity),
            Timestamp::from_secs(20)
        );
    }

    #[test]
    fn rounding_is_idempotent_and_monotonic() {
        let granularity = ExpiryGranularity::new(10).unwrap();

        for secs in 0..100 {
            let timestamp = Timestamp::from_secs(secs);
            let rounded = timestamp.round_up_to(granularity);
            assert!(rounded >= timestamp);
            assert_eq!(rounded.round_up_to(granularity), rounded);
        }
    }

    #[test]
    fn boundary_is_unchanged() {
        let granularity = ExpiryGranularity::new(10).unwrap();
        assert_eq!(
            Timestamp::from_secs(30).round_up_to(granularity),
            Timestamp::from_secs(30)
        );
    }

    #[test]
    fn saturating_duration_arithmetic() {
        let timestamp = Timestamp::from_secs(10);
        assert_eq!(
            timestamp + Duration::from_secs(5),
            Timestamp::from_secs(15)
        );
        assert_eq!(timestamp - Duration::from_secs(15), Timestamp::from_secs(0));
        assert_eq!(
            Timestamp::from_secs(u64::MAX) + Duration::from_secs(1),
            Timestamp::from_secs(u64::MAX)
        );
    }

    #[test]
    fn granularity_rejects_zero() {
        assert_eq!(ExpiryGranularity::new(0), Err(GranularityError::Zero));
    }

    #[test]
    fn timestamp_from_str() {
        let timestamp = Timestamp::from_secs(1_700_000_000);
        assert_eq!(
            Timestamp::from_str(&timestamp.to_string()).unwrap(),
            timestamp
        );
    }
}
