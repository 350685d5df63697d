//! Timeout values with the grid's `-1` "disabled" sentinel.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A bound that can be switched off.
///
/// Serialized as integer milliseconds; any negative number (conventionally
/// `-1`) means disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Timeout {
    /// Never time out.
    Disabled,
    /// Time out after the given duration.
    After(Duration),
}

impl Timeout {
    /// Sentinel value meaning disabled.
    pub const DISABLED_SENTINEL: i64 = -1;

    /// Convert from milliseconds, negative meaning disabled.
    pub fn from_millis(ms: i64) -> Self {
        u64::try_from(ms).map_or(Self::Disabled, |ms| Self::After(Duration::from_millis(ms)))
    }

    /// Milliseconds, or the sentinel when disabled.
    pub fn as_millis(self) -> i64 {
        match self {
            Self::Disabled => Self::DISABLED_SENTINEL,
            Self::After(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// The bound, if any.
    pub const fn as_duration(self) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::After(d) => Some(d),
        }
    }

    /// `true` for [`Timeout::Disabled`].
    pub const fn is_disabled(self) -> bool {
        matches!(self, Self::Disabled)
    }

    /// Whether something that started at `since_ms` has run past the bound.
    pub fn has_elapsed(self, since_ms: u128, now_ms: u128) -> bool {
        self.as_duration()
            .is_some_and(|d| crate::util::clock::elapsed_ms(since_ms, now_ms) >= d.as_millis())
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::Disabled
    }
}

impl From<i64> for Timeout {
    fn from(ms: i64) -> Self {
        Self::from_millis(ms)
    }
}

impl From<Timeout> for i64 {
    fn from(t: Timeout) -> Self {
        t.as_millis()
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::After(d)
    }
}
