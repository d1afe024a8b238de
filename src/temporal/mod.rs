//! Date normalization and month/year bucketing.

pub mod buckets;
pub mod dates;

pub use buckets::{month_key, month_key_to_year, year_key};
pub use dates::DateNormalizer;
