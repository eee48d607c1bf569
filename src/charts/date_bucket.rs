//! Date and bucket-key primitives.
//!
//! Timeline charts bucket rows by a calendar value truncated to a granularity
//! and rendered as a zero-padded key (`YYYY-MM-DD HH:MM` and its prefixes).
//! Because keys are zero-padded, lexicographic order on keys is also
//! chronological order, and the parent of a key is a string prefix.

use crate::constants::GROUP_KEY_SEPARATOR;
use crate::types::RowValue;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Timeline granularity, ordered from finest to coarsest
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateGranularity {
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl DateGranularity {
    /// Next coarser granularity, `None` for years.
    pub fn parent(self) -> Option<DateGranularity> {
        match self {
            DateGranularity::Minute => Some(DateGranularity::Hour),
            DateGranularity::Hour => Some(DateGranularity::Day),
            DateGranularity::Day => Some(DateGranularity::Month),
            DateGranularity::Month => Some(DateGranularity::Year),
            DateGranularity::Year => None,
        }
    }

    /// Length of a bucket key rendered at this granularity.
    pub fn key_len(self) -> usize {
        match self {
            DateGranularity::Year => 4,
            DateGranularity::Month => 7,
            DateGranularity::Day => 10,
            DateGranularity::Hour => 13,
            DateGranularity::Minute => 16,
        }
    }
}

/// Structured calendar value extracted from a row
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChartDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl ChartDate {
    pub fn from_naive(value: &NaiveDateTime) -> Self {
        Self {
            year: value.year(),
            month: value.month(),
            day: value.day(),
            hour: value.hour(),
            minute: value.minute(),
            second: value.second(),
        }
    }

    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)?.and_hms_opt(
            self.hour,
            self.minute,
            self.second,
        )
    }

    /// Zero every component finer than `granularity`.
    pub fn truncate(&self, granularity: DateGranularity) -> ChartDate {
        let mut out = *self;
        out.second = 0;
        if granularity >= DateGranularity::Hour {
            out.minute = 0;
        }
        if granularity >= DateGranularity::Day {
            out.hour = 0;
        }
        if granularity >= DateGranularity::Month {
            out.day = 1;
        }
        if granularity >= DateGranularity::Year {
            out.month = 1;
        }
        out
    }

    /// Render the canonical bucket key at `granularity`.
    pub fn to_bucket_key(&self, granularity: DateGranularity) -> String {
        match granularity {
            DateGranularity::Year => format!("{:04}", self.year),
            DateGranularity::Month => format!("{:04}-{:02}", self.year, self.month),
            DateGranularity::Day => {
                format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
            }
            DateGranularity::Hour => format!(
                "{:04}-{:02}-{:02} {:02}",
                self.year, self.month, self.day, self.hour
            ),
            DateGranularity::Minute => format!(
                "{:04}-{:02}-{:02} {:02}:{:02}",
                self.year, self.month, self.day, self.hour, self.minute
            ),
        }
    }

    /// The following bucket start at `granularity`, using real calendar
    /// arithmetic. Only used for gap-filling.
    pub fn next(&self, granularity: DateGranularity) -> Option<ChartDate> {
        let base = self.truncate(granularity);
        match granularity {
            DateGranularity::Year => Some(ChartDate {
                year: base.year.checked_add(1)?,
                ..base
            }),
            DateGranularity::Month => {
                if base.month >= 12 {
                    Some(ChartDate {
                        year: base.year.checked_add(1)?,
                        month: 1,
                        ..base
                    })
                } else {
                    Some(ChartDate {
                        month: base.month + 1,
                        ..base
                    })
                }
            }
            DateGranularity::Day => {
                let date = NaiveDate::from_ymd_opt(base.year, base.month, base.day)?.succ_opt()?;
                Some(ChartDate {
                    year: date.year(),
                    month: date.month(),
                    day: date.day(),
                    ..base
                })
            }
            DateGranularity::Hour => base
                .to_naive()?
                .checked_add_signed(Duration::hours(1))
                .map(|dt| ChartDate::from_naive(&dt)),
            DateGranularity::Minute => base
                .to_naive()?
                .checked_add_signed(Duration::minutes(1))
                .map(|dt| ChartDate::from_naive(&dt)),
        }
    }
}

/// Parse a date-like row value.
///
/// Accepts native dates, `YYYY-MM`, `YYYY-MM-DD`, `YYYY-MM-DD[ T]HH:MM[:SS[.f]]`
/// and RFC 3339 timestamps. Offsets are not applied: the wall-clock
/// components written in the value are what gets bucketed.
pub fn parse_chart_date(value: &RowValue) -> Option<ChartDate> {
    match value {
        RowValue::Date(dt) => Some(ChartDate::from_naive(dt)),
        RowValue::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn parse_date_str(s: &str) -> Option<ChartDate> {
    let bytes = s.as_bytes();
    if bytes.len() < 7 || !bytes[..4].iter().all(u8::is_ascii_digit) || bytes[4] != b'-' {
        return None;
    }

    if bytes.len() == 7 {
        let year: i32 = s[..4].parse().ok()?;
        let month: u32 = s.get(5..7)?.parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        return Some(ChartDate {
            year,
            month,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        });
    }

    if bytes.len() == 10 {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .map(|d| ChartDate::from_naive(&d.and_time(chrono::NaiveTime::MIN)));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(ChartDate::from_naive(&dt.naive_local()));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| ChartDate::from_naive(&dt))
}

/// Distance between two bucket dates in `granularity` units.
///
/// Uses fixed 365-day years and 30-day months. This only decides when a
/// timeline is wide enough to roll up, so the approximation is kept stable
/// rather than calendar-exact.
pub fn bucket_distance(begin: &ChartDate, end: &ChartDate, granularity: DateGranularity) -> i64 {
    let years = i64::from(end.year) - i64::from(begin.year);
    let months = i64::from(end.month) - i64::from(begin.month);
    let days = i64::from(end.day) - i64::from(begin.day);
    let hours = i64::from(end.hour) - i64::from(begin.hour);
    let minutes = i64::from(end.minute) - i64::from(begin.minute);

    let day_span = years * 365 + months * 30 + days;
    match granularity {
        DateGranularity::Year => years,
        DateGranularity::Month => years * 12 + months,
        DateGranularity::Day => day_span,
        DateGranularity::Hour => day_span * 24 + hours,
        DateGranularity::Minute => (day_span * 24 + hours) * 60 + minutes,
    }
}

/// Split a bucket key into its optional group prefix and the X key.
pub fn split_group_key(key: &str) -> (Option<&str>, &str) {
    match key.rsplit_once(GROUP_KEY_SEPARATOR) {
        Some((group, x_key)) => (Some(group), x_key),
        None => (None, key),
    }
}

/// Build a bucket key from an optional group and an X key.
pub fn join_group_key(group: Option<&str>, x_key: &str) -> String {
    match group {
        Some(group) => format!("{}{}{}", group, GROUP_KEY_SEPARATOR, x_key),
        None => x_key.to_string(),
    }
}

/// Parent key of a date bucket key, keeping any group prefix.
pub fn parent_bucket_key(key: &str, parent: DateGranularity, grouped: bool) -> String {
    let (group, x_key) = if grouped {
        split_group_key(key)
    } else {
        (None, key)
    };
    let truncated = x_key.get(..parent.key_len()).unwrap_or(x_key);
    join_group_key(group, truncated)
}
