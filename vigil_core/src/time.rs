use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in trace time, measured in milliseconds.
///
/// Trace time is whatever clock the driver stamps admissions with; the engine
/// only relies on its total order and on millisecond arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time(u64);

impl Time {
    /// The origin of trace time.
    pub const ZERO: Time = Time(0);

    /// A timestamp `millis` milliseconds after the origin.
    pub fn from_millis(millis: u64) -> Self {
        Time(millis)
    }

    /// Milliseconds since the origin.
    pub fn millis(self) -> u64 {
        self.0
    }

    /// Strict order: `true` iff `self` is strictly earlier than `other`.
    pub fn is_before(self, other: Time) -> bool {
        self < other
    }

    /// The timestamp `duration` later than `self` (saturating).
    pub fn after(self, duration: Duration) -> Time {
        Time(self.0.saturating_add(duration.millis()))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// The units a [`Duration`] can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Thousandths of a second.
    Milliseconds,
    /// Whole seconds.
    Seconds,
}

/// A span of trace time, used only as an offset for bounded modalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    magnitude: u64,
    unit: TimeUnit,
}

impl Duration {
    /// A duration of `magnitude` in the given unit.
    pub fn new(magnitude: u64, unit: TimeUnit) -> Self {
        Duration { magnitude, unit }
    }

    /// A duration of `millis` milliseconds.
    pub fn from_millis(millis: u64) -> Self {
        Self::new(millis, TimeUnit::Milliseconds)
    }

    /// A duration of `secs` seconds.
    pub fn from_secs(secs: u64) -> Self {
        Self::new(secs, TimeUnit::Seconds)
    }

    /// The canonical value in milliseconds (saturating).
    pub fn millis(self) -> u64 {
        match self.unit {
            TimeUnit::Milliseconds => self.magnitude,
            TimeUnit::Seconds => self.magnitude.saturating_mul(1000),
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            TimeUnit::Milliseconds => write!(f, "{}ms", self.magnitude),
            TimeUnit::Seconds => write!(f, "{}s", self.magnitude),
        }
    }
}
