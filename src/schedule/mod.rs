//! Weekly availability windows and session-slot matching.
//!
//! A tutor declares, per weekday, a list of half-open time windows such as
//! `"09:00-10:00"`. A requested session start time matches a window
//! `[start, end)` when `start <= t < end`. Only the start time is checked;
//! the session duration is deliberately not validated against the window's
//! upper bound.
//!
//! Dates are naive calendar dates. The weekday is derived from the civil
//! calendar with no timezone conversion, so matching is deterministic
//! regardless of server locale.

use chrono::{Datelike, NaiveDate};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Day of the week, keyed by its full English name in stored availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }

    /// Weekday of a naive calendar date.
    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse `"HH:MM"` into minutes since midnight.
pub fn parse_minutes(s: &str) -> Option<u16> {
    let (h, m) = s.split_once(':')?;
    let h: u16 = h.parse().ok()?;
    let m: u16 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

/// A half-open window `[start, end)` in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: u16,
    end: u16,
}

impl TimeWindow {
    pub fn new(start: u16, end: u16) -> Option<Self> {
        if start < end && end <= 24 * 60 {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    /// Whether a start time falls inside this window (half-open).
    pub fn contains(&self, minute: u16) -> bool {
        self.start <= minute && minute < self.end
    }
}

impl FromStr for TimeWindow {
    type Err = WindowParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s
            .split_once('-')
            .ok_or_else(|| WindowParseError(s.to_string()))?;
        let start = parse_minutes(a.trim()).ok_or_else(|| WindowParseError(s.to_string()))?;
        let end = parse_minutes(b.trim()).ok_or_else(|| WindowParseError(s.to_string()))?;
        TimeWindow::new(start, end).ok_or_else(|| WindowParseError(s.to_string()))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid time window: {0}")]
pub struct WindowParseError(pub String);

impl Serialize for TimeWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeWindow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(DeError::custom)
    }
}

/// Recurring weekly availability: weekday -> ordered windows.
///
/// Stored in `tutor_profiles.availability` as a JSON object, e.g.
/// `{"Monday": ["09:00-10:00", "14:00-16:00"]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyAvailability(pub BTreeMap<Weekday, Vec<TimeWindow>>);

impl WeeklyAvailability {
    /// Parse from the stored JSON column. `None` or malformed JSON yields
    /// an empty schedule, which matches no slot.
    pub fn from_json(json: Option<&str>) -> Self {
        json.and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            serde_json::to_string(self).ok()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|w| w.is_empty())
    }

    /// Whether a session starting at `minute` on `day` falls inside any
    /// declared window.
    pub fn covers(&self, day: Weekday, minute: u16) -> bool {
        self.0
            .get(&day)
            .map(|windows| windows.iter().any(|w| w.contains(minute)))
            .unwrap_or(false)
    }

    /// Whether a session on `date` starting at `minute` is bookable.
    pub fn covers_date(&self, date: NaiveDate, minute: u16) -> bool {
        self.covers(Weekday::of(date), minute)
    }
}
