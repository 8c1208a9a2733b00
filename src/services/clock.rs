//! Report time zone handling
//!
//! Every timestamp the engine prints (file dates, comparison time, audit lines)
//! and every scheduled checkpoint is expressed in one configured zone: either
//! the system local zone or a fixed UTC offset.

use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, SubsecRound, Utc};
use std::time::SystemTime;

/// `YYYY-MM-DD HH:MM:SS`, used by every text report.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportClock {
    offset: Option<FixedOffset>,
}

impl ReportClock {
    /// Clock following the system local time zone.
    #[must_use]
    pub fn local() -> Self {
        Self { offset: None }
    }

    /// Clock pinned to a fixed UTC offset.
    #[must_use]
    pub fn fixed(offset: FixedOffset) -> Self {
        Self {
            offset: Some(offset),
        }
    }

    /// Build a clock from a configuration value: `local`, `UTC`/`Z`, or an
    /// offset such as `+05:00`, `-0330`, `+5`.
    pub fn from_setting(setting: Option<&str>) -> Result<Self> {
        match setting.map(str::trim) {
            None | Some("") => Ok(Self::local()),
            Some(value) if value.eq_ignore_ascii_case("local") => Ok(Self::local()),
            Some(value) => parse_offset(value).map(Self::fixed),
        }
    }

    #[must_use]
    pub fn offset(&self) -> Option<FixedOffset> {
        self.offset
    }

    /// Current instant in the configured zone.
    #[must_use]
    pub fn now(&self) -> DateTime<FixedOffset> {
        match self.offset {
            Some(offset) => Utc::now().with_timezone(&offset),
            None => Local::now().fixed_offset(),
        }
    }

    /// Current wall-clock time in the configured zone, truncated to seconds.
    #[must_use]
    pub fn now_naive(&self) -> NaiveDateTime {
        self.now().naive_local().trunc_subsecs(0)
    }

    /// Express a filesystem timestamp in the configured zone, truncated to seconds.
    #[must_use]
    pub fn localize(&self, time: SystemTime) -> NaiveDateTime {
        let utc: DateTime<Utc> = time.into();
        let local = match self.offset {
            Some(offset) => utc.with_timezone(&offset).naive_local(),
            None => utc.with_timezone(&Local).naive_local(),
        };
        local.trunc_subsecs(0)
    }
}

#[must_use]
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .map_err(|e| Error::InvalidInput(format!("invalid timestamp '{value}': {e}")))
}

fn parse_offset(value: &str) -> Result<FixedOffset> {
    if value.eq_ignore_ascii_case("utc") || value.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0).ok_or_else(|| invalid_offset(value));
    }

    let (sign, rest) = match value.as_bytes().first() {
        Some(b'+') => (1, &value[1..]),
        Some(b'-') => (-1, &value[1..]),
        _ => return Err(invalid_offset(value)),
    };

    let (hours, minutes) = if let Some((h, m)) = rest.split_once(':') {
        (h, m)
    } else if rest.len() == 4 {
        match (rest.get(..2), rest.get(2..)) {
            (Some(h), Some(m)) => (h, m),
            _ => return Err(invalid_offset(value)),
        }
    } else {
        (rest, "0")
    };

    let hours: i32 = hours.parse().map_err(|_| invalid_offset(value))?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid_offset(value))?;
    if !(0..=23).contains(&hours) || !(0..=59).contains(&minutes) {
        return Err(invalid_offset(value));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(|| invalid_offset(value))
}

fn invalid_offset(value: &str) -> Error {
    Error::Config(format!(
        "invalid UTC offset '{value}' (expected 'local', 'UTC' or e.g. '+05:00')"
    ))
}
