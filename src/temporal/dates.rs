//! Conversion of heterogeneous temporal values into calendar dates.
//!
//! Records arrive with structured timestamp objects, ISO strings, epoch
//! milliseconds and free-text month labels. Every input either resolves to a
//! `NaiveDate` or to `None`; callers exclude `None` from aggregation.

use chrono::{DateTime, Datelike, Month, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %B %Y",
    "%B %d, %Y",
    "%B %d %Y",
];

/// Resolves arbitrary values to calendar dates.
///
/// Month labels without a year resolve against the reference year, which is
/// the current year unless a fixed one is supplied.
#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    reference_year: i32,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self::current()
    }
}

impl DateNormalizer {
    /// Normalizer anchored to `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            reference_year: today.year(),
        }
    }

    /// Normalizer anchored to the current UTC date.
    pub fn current() -> Self {
        Self::new(Utc::now().date_naive())
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Resolves a raw JSON value.
    ///
    /// Rules, in order: structured timestamp objects, month labels
    /// (optionally with a four digit year), then generic date parsing.
    pub fn normalize(&self, value: &Value) -> Option<NaiveDate> {
        let date = match value {
            Value::Object(map) => timestamp_object(map),
            Value::String(s) => self.normalize_str(s),
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                .and_then(DateTime::from_timestamp_millis)
                .map(|dt| dt.date_naive()),
            _ => None,
        };
        date.filter(supported)
    }

    /// Resolves a string label.
    pub fn normalize_str(&self, label: &str) -> Option<NaiveDate> {
        self.month_label(label)
            .or_else(|| parse_generic(label))
            .filter(supported)
    }

    /// Resolves a label from a month-keyed history map.
    ///
    /// A bare year names no month, so it resolves to `None` here.
    pub fn normalize_month_str(&self, label: &str) -> Option<NaiveDate> {
        let trimmed = label.trim();
        if trimmed.len() == 4 && all_digits(trimmed) {
            return None;
        }
        self.normalize_str(trimmed)
    }

    /// First day of the month named by `label`.
    ///
    /// Accepts `"YYYY-MM"`, or a month name (full or abbreviated) with at most
    /// one four digit year token, e.g. `"April"`, `"apr 2024"`, `"2024 April"`.
    fn month_label(&self, label: &str) -> Option<NaiveDate> {
        let trimmed = label.trim();

        if let Some((year, month)) = trimmed.split_once('-') {
            if year.len() == 4
                && (1..=2).contains(&month.len())
                && all_digits(year)
                && all_digits(month)
            {
                return NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1);
            }
        }

        let mut month: Option<Month> = None;
        let mut year: Option<i32> = None;
        for token in trimmed
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            if let Ok(m) = token.parse::<Month>() {
                if month.replace(m).is_some() {
                    return None;
                }
            } else if token.len() == 4 && all_digits(token) {
                if year.replace(token.parse().ok()?).is_some() {
                    return None;
                }
            } else {
                return None;
            }
        }

        NaiveDate::from_ymd_opt(
            year.unwrap_or(self.reference_year),
            month?.number_from_month(),
            1,
        )
    }
}

/// `{seconds, nanoseconds}` (optionally underscore-prefixed) or `{"$date": ...}`.
fn timestamp_object(map: &Map<String, Value>) -> Option<NaiveDate> {
    let field = |names: &[&str]| names.iter().find_map(|n| map.get(*n));

    if let Some(seconds) = field(&["seconds", "_seconds"]).and_then(Value::as_i64) {
        let nanos = field(&["nanoseconds", "_nanoseconds"])
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0);
        return DateTime::from_timestamp(seconds, nanos).map(|dt| dt.date_naive());
    }

    match map.get("$date")? {
        Value::String(s) => parse_generic(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.date_naive()),
        _ => None,
    }
}

/// Generic date parsing: RFC 3339, RFC 2822, common layouts, and bare years.
fn parse_generic(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.date());
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    {
        return Some(date);
    }
    if s.len() == 4 && all_digits(s) {
        return NaiveDate::from_ymd_opt(s.parse().ok()?, 1, 1);
    }

    None
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Keys are zero-padded four digit years, so anything else is rejected.
fn supported(date: &NaiveDate) -> bool {
    (0..=9999).contains(&date.year())
}
