//! Month and year bucket keys.
//!
//! Keys are zero padded (`"YYYY-MM"`, `"YYYY"`) so lexicographic order is
//! chronological order. Every fold in the crate keys its accumulator with
//! these functions.

use chrono::{Datelike, NaiveDate};

/// `"YYYY-MM"` key for a date.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// `"YYYY"` key for a date.
pub fn year_key(date: NaiveDate) -> String {
    format!("{:04}", date.year())
}

/// Truncates a month key to its year key.
pub fn month_key_to_year(key: &str) -> Option<&str> {
    key.get(..4).filter(|y| y.bytes().all(|b| b.is_ascii_digit()))
}
