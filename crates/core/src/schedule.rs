// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule specifications.
//!
//! A schedule is either a one-shot absolute time or a recurring interval,
//! optionally anchored at a start time and bounded by an end time. Times are
//! written `"YYYY-MM-DD HH:MM:SS"`; `local: true` entries are interpreted in
//! the device's local offset at evaluation time.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleParseError {
    #[error("invalid schedule time {0:?}, expected \"YYYY-MM-DD HH:MM:SS\"")]
    BadTime(String),
    #[error("invalid interval {0:?}, expected units of d/h/m/s (e.g. \"1d12h\")")]
    BadInterval(String),
    #[error("interval must be non-zero")]
    ZeroInterval,
}

/// A wall-clock timestamp without timezone; the `local` flag on the owning
/// schedule decides whether it means UTC or device-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScheduleTime(pub NaiveDateTime);

impl ScheduleTime {
    pub fn parse(s: &str) -> Result<Self, ScheduleParseError> {
        NaiveDateTime::parse_from_str(s, TIME_FORMAT)
            .map(Self)
            .map_err(|_| ScheduleParseError::BadTime(s.to_string()))
    }

    /// Interpret as an absolute UTC instant, applying `offset_secs` for
    /// local-time schedules (0 for UTC schedules).
    pub fn to_utc(&self, offset_secs: i64) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.0) - ChronoDuration::seconds(offset_secs)
    }
}

impl std::fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(TIME_FORMAT))
    }
}

impl Serialize for ScheduleTime {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ScheduleTime {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        ScheduleTime::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A recurring interval, written as concatenated unit terms: `"1d12h30m15s"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    secs: u64,
}

impl Interval {
    pub fn from_secs(secs: u64) -> Result<Self, ScheduleParseError> {
        if secs == 0 {
            return Err(ScheduleParseError::ZeroInterval);
        }
        Ok(Self { secs })
    }

    pub fn parse(s: &str) -> Result<Self, ScheduleParseError> {
        let bad = || ScheduleParseError::BadInterval(s.to_string());
        let mut secs = 0u64;
        let mut num = String::new();
        for ch in s.chars() {
            if ch.is_ascii_digit() {
                num.push(ch);
                continue;
            }
            let n: u64 = num.parse().map_err(|_| bad())?;
            num.clear();
            secs += match ch {
                'd' => n * 86_400,
                'h' => n * 3_600,
                'm' => n * 60,
                's' => n,
                _ => return Err(bad()),
            };
        }
        if !num.is_empty() {
            return Err(bad());
        }
        Interval::from_secs(secs).map_err(|_| bad())
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.secs)
    }

    pub fn as_chrono(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.secs as i64)
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut rest = self.secs;
        let mut out = String::new();
        for (unit, label) in [(86_400, 'd'), (3_600, 'h'), (60, 'm'), (1, 's')] {
            let n = rest / unit;
            rest %= unit;
            if n > 0 {
                out.push_str(&format!("{n}{label}"));
            }
        }
        f.write_str(&out)
    }
}

impl Serialize for Interval {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Interval {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Interval::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Declarative schedule attached to an Activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleSpec {
    /// One-shot due time, or the anchor for a recurring interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<ScheduleTime>,
    /// Recurrence period. Absent means one-shot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    /// Skip missed firings instead of running them late.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip: bool,
    /// Interpret `start`/`end` in device-local time.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub local: bool,
    /// Stop recurring after this time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<ScheduleTime>,
}

impl ScheduleSpec {
    /// A schedule must have a due time source, and only recurring schedules
    /// may carry `skip` or `end`.
    pub fn validate(&self) -> Result<(), String> {
        if self.start.is_none() && self.interval.is_none() {
            return Err("schedule requires 'start' or 'interval'".to_string());
        }
        if self.interval.is_none() && (self.skip || self.end.is_some()) {
            return Err("'skip' and 'end' apply only to interval schedules".to_string());
        }
        Ok(())
    }

    pub fn is_recurring(&self) -> bool {
        self.interval.is_some()
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
