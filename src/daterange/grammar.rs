//! Ordered date range grammar.
//!
//! Each rule pairs a pattern with a resolver. Rules are tried in order and the
//! first match wins; input that matches no rule is an error.

use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::calendar::{self, Unit};
use super::error::DateRangeError;
use crate::config::WeekStart;

/// Inclusive local bounds produced by a rule
pub(super) type Span = (DateTime<FixedOffset>, DateTime<FixedOffset>);

/// The reference point every relative expression is resolved against
pub(super) struct Anchor {
    pub now: DateTime<FixedOffset>,
    pub week_start: WeekStart,
}

type Resolve = fn(&Captures<'_>, &Anchor) -> Result<Span, DateRangeError>;

pub(super) struct Rule {
    pub name: &'static str,
    pub regex: Regex,
    pub resolve: Resolve,
}

fn rule(name: &'static str, pattern: &str, resolve: Resolve) -> Rule {
    Rule {
        name,
        regex: Regex::new(pattern).unwrap(),
        resolve,
    }
}

pub(super) static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule("relative_day", r"(?i)^(today|yesterday|tomorrow)$", relative_day),
        rule(
            "calendar_period",
            r"(?i)^(this|last|next)\s+(week|month|quarter|year)$",
            calendar_period,
        ),
        rule(
            "trailing",
            r"(?i)^last\s+(\d+)\s+(day|week|month|quarter|year)s?$",
            trailing,
        ),
        rule("from_to", r"(?i)^from\s+(\S+)\s+to\s+(\S+)$", from_to),
        rule("single_date", r"^(\d{4}-\d{2}-\d{2})$", single_date),
    ]
});

fn whole(caps: &Captures<'_>) -> String {
    caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default()
}

fn group<'t>(caps: &Captures<'t>, i: usize) -> &'t str {
    caps.get(i).map(|m| m.as_str()).unwrap_or_default()
}

fn days_span(
    caps: &Captures<'_>,
    anchor: &Anchor,
    unit: Unit,
    offset: i32,
) -> Result<Span, DateRangeError> {
    let tz = anchor.now.timezone();
    let (first, last) = calendar::period_bounds(anchor.now.date_naive(), unit, offset, anchor.week_start)
        .ok_or_else(|| DateRangeError::OutOfRange(whole(caps)))?;
    let start = calendar::start_of_day(first, &tz);
    let end = calendar::end_of_day(last, &tz);
    start
        .zip(end)
        .ok_or_else(|| DateRangeError::OutOfRange(whole(caps)))
}

fn relative_day(caps: &Captures<'_>, anchor: &Anchor) -> Result<Span, DateRangeError> {
    let offset = match group(caps, 1).to_lowercase().as_str() {
        "yesterday" => -1,
        "tomorrow" => 1,
        _ => 0,
    };
    days_span(caps, anchor, Unit::Day, offset)
}

fn calendar_period(caps: &Captures<'_>, anchor: &Anchor) -> Result<Span, DateRangeError> {
    let offset = match group(caps, 1).to_lowercase().as_str() {
        "last" => -1,
        "next" => 1,
        _ => 0,
    };
    let unit = Unit::parse(&group(caps, 2).to_lowercase())
        .ok_or_else(|| DateRangeError::Unrecognized(whole(caps)))?;
    days_span(caps, anchor, unit, offset)
}

fn trailing(caps: &Captures<'_>, anchor: &Anchor) -> Result<Span, DateRangeError> {
    let n: u32 = group(caps, 1)
        .parse()
        .map_err(|_| DateRangeError::OutOfRange(whole(caps)))?;
    if n == 0 {
        return Err(DateRangeError::NonPositiveCount(whole(caps)));
    }
    let unit = Unit::parse(&group(caps, 2).to_lowercase())
        .ok_or_else(|| DateRangeError::Unrecognized(whole(caps)))?;
    let start = calendar::trailing_start(anchor.now, unit, n)
        .ok_or_else(|| DateRangeError::OutOfRange(whole(caps)))?;
    Ok((start, anchor.now))
}

fn from_to(caps: &Captures<'_>, anchor: &Anchor) -> Result<Span, DateRangeError> {
    literal_span(group(caps, 1), group(caps, 2), &anchor.now.timezone())
}

fn single_date(caps: &Captures<'_>, anchor: &Anchor) -> Result<Span, DateRangeError> {
    let day = group(caps, 1);
    literal_span(day, day, &anchor.now.timezone())
}

/// `[start, end]` from two literal bounds: dates widen to whole days,
/// instants are kept exactly
pub(super) fn literal_span(
    start: &str,
    end: &str,
    tz: &FixedOffset,
) -> Result<Span, DateRangeError> {
    let parse = |s: &str| {
        calendar::parse_bound(s, tz).ok_or_else(|| DateRangeError::InvalidDate(s.trim().to_string()))
    };
    let start_bound = parse(start)?;
    let end_bound = parse(end)?;
    let out_of_range = || DateRangeError::OutOfRange(format!("{} .. {}", start.trim(), end.trim()));
    Ok((
        start_bound.as_start(tz).ok_or_else(out_of_range)?,
        end_bound.as_end(tz).ok_or_else(out_of_range)?,
    ))
}
