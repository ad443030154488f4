use chrono::{DateTime, Utc};
use thiserror::Error;

/// Date range resolution errors.
///
/// A non-empty date range that fails to resolve is always an error; it is
/// never treated as "no range".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("date range is empty")]
    Empty,

    #[error("unrecognized date range '{0}'")]
    Unrecognized(String),

    #[error("invalid date or timestamp '{0}' (use YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)")]
    InvalidDate(String),

    #[error("a literal date range needs exactly 2 elements, got {0}")]
    InvalidInterval(usize),

    #[error("date range '{0}': the count must be a positive integer")]
    NonPositiveCount(String),

    #[error("date range '{0}' falls outside the supported calendar")]
    OutOfRange(String),

    #[error("date range is inverted: start {start} is after end {end}")]
    Inverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}
