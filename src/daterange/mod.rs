//! Date Range Resolver (verb module)
//!
//! Turns a `dateRange` value into an absolute, inclusive `[start, end]` pair
//! of UTC instants. Relative expressions are resolved against an explicit
//! `now` so that the same input and clock always give the same output.
//!
//! Supported forms, matched case-insensitively after trimming:
//!
//! - `today`, `yesterday`, `tomorrow`
//! - `this|last|next week|month|quarter|year` (full calendar period)
//! - `last N days|weeks|months|quarters|years` (trailing window ending at `now`)
//! - `from <date> to <date>`
//! - a single `YYYY-MM-DD` (that whole day)
//! - a two-element list of dates or timestamps
//!
//! Calendar boundaries are computed in the configured timezone; a date-only
//! end bound closes at 23:59:59.

mod calendar;
mod error;
mod grammar;

pub use error::DateRangeError;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::config::{CompilerConfig, WeekStart};
use crate::query::DateRangeExpr;
use grammar::{Anchor, Span, RULES};

/// An absolute, inclusive time interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedDateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ResolvedDateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

impl std::fmt::Display for ResolvedDateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Resolves date range expressions in one timezone and week convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRangeResolver {
    timezone: FixedOffset,
    week_start: WeekStart,
}

impl Default for DateRangeResolver {
    fn default() -> Self {
        Self::new(&CompilerConfig::default())
    }
}

impl DateRangeResolver {
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            timezone: config.timezone,
            week_start: config.week_start,
        }
    }

    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    /// Resolve either form of `dateRange`
    ///
    /// Granularity is not an input: bucketing never widens or snaps the range.
    pub fn resolve(
        &self,
        expr: &DateRangeExpr,
        now: DateTime<Utc>,
    ) -> Result<ResolvedDateRange, DateRangeError> {
        match expr {
            DateRangeExpr::Expression(text) => self.resolve_expression(text, now),
            DateRangeExpr::Interval(parts) => match parts.as_slice() {
                [start, end] => self.resolve_interval(start, end),
                _ => Err(DateRangeError::InvalidInterval(parts.len())),
            },
        }
    }

    /// Resolve a textual expression against `now`
    pub fn resolve_expression(
        &self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<ResolvedDateRange, DateRangeError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DateRangeError::Empty);
        }

        let anchor = Anchor {
            now: now.with_timezone(&self.timezone),
            week_start: self.week_start,
        };

        for rule in RULES.iter() {
            if let Some(caps) = rule.regex.captures(text) {
                tracing::trace!(rule = rule.name, expression = text, "Date range rule matched");
                return to_utc((rule.resolve)(&caps, &anchor)?);
            }
        }

        Err(DateRangeError::Unrecognized(text.to_string()))
    }

    /// Resolve a literal `[start, end]` pair. Date-only bounds cover whole
    /// days; timestamps are exact.
    pub fn resolve_interval(
        &self,
        start: &str,
        end: &str,
    ) -> Result<ResolvedDateRange, DateRangeError> {
        to_utc(grammar::literal_span(start, end, &self.timezone)?)
    }

    /// A single instant for point comparisons (`beforeDate`, `gt` on time).
    ///
    /// A date-only value means the start of that day.
    pub fn resolve_instant(&self, value: &str) -> Result<DateTime<Utc>, DateRangeError> {
        calendar::parse_bound(value, &self.timezone)
            .and_then(|bound| bound.as_start(&self.timezone))
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(|| DateRangeError::InvalidDate(value.trim().to_string()))
    }
}

fn to_utc((start, end): Span) -> Result<ResolvedDateRange, DateRangeError> {
    ResolvedDateRange::new(start.with_timezone(&Utc), end.with_timezone(&Utc))
}
