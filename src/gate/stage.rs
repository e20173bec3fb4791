//! Challenge stages and timing windows.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::zones::ZoneId;

/// Discrete progress marker of one attempt.
///
/// Stages only ever move forward inside a session. A failure never
/// decrements the stage: the whole session is discarded and a new one
/// starts at [`Stage::Idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    /// Nothing accepted yet
    #[default]
    Idle,
    /// First click on zone A accepted
    FirstClick,
    /// Second click on zone B accepted
    SecondClick,
    /// First blind click on zone C accepted
    FirstBlind,
    /// Zone C re-skinned as the START button
    Armed,
    /// Burst window running
    Burst,
    /// Burst passed; verification in flight or done
    Success,
}

impl Stage {
    /// Numeric stage value, `0` (idle) through `6` (success).
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Snake-case name for log fields and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FirstClick => "first_click",
            Self::SecondClick => "second_click",
            Self::FirstBlind => "first_blind",
            Self::Armed => "armed",
            Self::Burst => "burst",
            Self::Success => "success",
        }
    }

    /// The zone whose clicks this stage reacts to.
    ///
    /// Returns `None` once the challenge has succeeded.
    #[must_use]
    pub const fn expected_zone(self) -> Option<ZoneId> {
        match self {
            Self::Idle => Some(ZoneId::A),
            Self::FirstClick => Some(ZoneId::B),
            Self::SecondClick | Self::FirstBlind | Self::Armed | Self::Burst => Some(ZoneId::C),
            Self::Success => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.index(), self.as_str())
    }
}

/// Inclusive millisecond range the next click must land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingWindow {
    /// Earliest accepted elapsed time
    pub min_ms: u64,
    /// Latest accepted elapsed time
    pub max_ms: u64,
}

impl TimingWindow {
    /// Creates a window accepting `min_ms..=max_ms`.
    #[must_use]
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Returns whether `elapsed_ms` falls inside the window, bounds included.
    #[must_use]
    pub const fn contains(self, elapsed_ms: u64) -> bool {
        elapsed_ms >= self.min_ms && elapsed_ms <= self.max_ms
    }

    /// Upper bound as a duration; the overlay for a stage runs this long.
    #[must_use]
    pub const fn max_duration(self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

impl std::fmt::Display for TimingWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}] ms", self.min_ms, self.max_ms)
    }
}

/// Converts a duration to whole milliseconds, saturating at `u64::MAX`.
#[must_use]
pub fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
