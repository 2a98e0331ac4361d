//! Day time model: 1-based 10-second slots ("time indices") and named
//! analysis windows.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of one time slot in seconds.
pub const SLOT_SECS: u32 = 10;

/// Number of slots in a day.
pub const SLOTS_PER_DAY: u32 = 24 * 3600 / SLOT_SECS;

/// 1-based index of a 10-second slot within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeIndex(u32);

impl TimeIndex {
    /// Wrap a raw index. Callers parsing untrusted input should use [`TimeIndex::parse`].
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Slot containing the given second of the day.
    pub fn from_seconds(seconds: u32) -> Self {
        Self(seconds / SLOT_SECS + 1)
    }

    /// Slot starting at `HH:MM`.
    pub fn from_hhmm(hhmm: &str) -> Result<Self, String> {
        let t = NaiveTime::parse_from_str(hhmm.trim(), "%H:%M")
            .map_err(|e| format!("invalid time '{hhmm}': {e}"))?;
        Ok(Self::from_seconds(t.num_seconds_from_midnight()))
    }

    /// Seconds since midnight at the start of this slot.
    pub fn seconds(self) -> u32 {
        self.0.saturating_sub(1) * SLOT_SECS
    }

    /// Format the slot start as `HH:MM`.
    pub fn to_hhmm(self) -> String {
        let s = self.seconds();
        format!("{:02}:{:02}", s / 3600, (s % 3600) / 60)
    }

    /// Parse a raw-table timestamp: either an integer slot index or a clock
    /// time `HH:MM:SS` / `HH:MM`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if let Ok(index) = raw.parse::<u32>() {
            if index == 0 || index > SLOTS_PER_DAY {
                return Err(format!("time index {index} outside 1..={SLOTS_PER_DAY}"));
            }
            return Ok(Self(index));
        }
        let t = NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .map_err(|_| format!("'{raw}' is neither a time index nor HH:MM[:SS]"))?;
        Ok(Self::from_seconds(t.num_seconds_from_midnight()))
    }

    /// Number of slots from `self` to `later` (0 if `later` is not after `self`).
    pub fn slots_until(self, later: TimeIndex) -> u32 {
        later.0.saturating_sub(self.0)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TimeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds();
        write!(
            f,
            "{:02}:{:02}:{:02}",
            s / 3600,
            (s % 3600) / 60,
            s % 60
        )
    }
}

/// Named analysis window over a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    /// 06:00 - 22:00.
    Full,
    /// 06:00 - 12:00.
    Morning,
    /// 12:00 - 18:00.
    Afternoon,
    /// 18:00 - 22:00.
    Evening,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 4] = [
        TimeWindow::Full,
        TimeWindow::Morning,
        TimeWindow::Afternoon,
        TimeWindow::Evening,
    ];

    /// `(start, end)` slot bounds. A window holds slots with `start < t <= end`,
    /// i.e. cumulative(end) minus cumulative(start).
    pub fn bounds(self) -> (TimeIndex, TimeIndex) {
        let (start, end) = match self {
            Self::Full => (2160, 7920),
            Self::Morning => (2160, 4320),
            Self::Afternoon => (4320, 6480),
            Self::Evening => (6480, 7920),
        };
        (TimeIndex(start), TimeIndex(end))
    }

    pub fn contains(self, t: TimeIndex) -> bool {
        let (start, end) = self.bounds();
        start < t && t <= end
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "morning" => Ok(Self::Morning),
            "afternoon" => Ok(Self::Afternoon),
            "evening" => Ok(Self::Evening),
            other => Err(format!(
                "unknown window '{other}' (expected full, morning, afternoon, evening)"
            )),
        }
    }
}
