//! Calendar arithmetic in a fixed-offset timezone

use chrono::{DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime};

use crate::config::WeekStart;

/// Calendar unit used by relative expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Unit {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Unit {
    /// Parse a singular unit name (already lower-cased)
    pub(super) fn parse(s: &str) -> Option<Self> {
        match s {
            "day" => Some(Unit::Day),
            "week" => Some(Unit::Week),
            "month" => Some(Unit::Month),
            "quarter" => Some(Unit::Quarter),
            "year" => Some(Unit::Year),
            _ => None,
        }
    }

    /// Length in calendar months for month-based units
    fn months(self) -> Option<u32> {
        match self {
            Unit::Month => Some(1),
            Unit::Quarter => Some(3),
            Unit::Year => Some(12),
            Unit::Day | Unit::Week => None,
        }
    }
}

/// A literal bound: a whole calendar date or an exact instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Bound {
    Date(NaiveDate),
    Instant(DateTime<FixedOffset>),
}

impl Bound {
    /// Dates open at 00:00:00, instants are used as given
    pub(super) fn as_start(self, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
        match self {
            Bound::Date(d) => start_of_day(d, tz),
            Bound::Instant(t) => Some(t),
        }
    }

    /// Dates close at 23:59:59, instants are used as given
    pub(super) fn as_end(self, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
        match self {
            Bound::Date(d) => end_of_day(d, tz),
            Bound::Instant(t) => Some(t),
        }
    }
}

/// Parse `YYYY-MM-DD`, RFC 3339, or a naive `YYYY-MM-DD[T ]HH:MM:SS[.fff]`
/// taken in `tz`
pub(super) fn parse_bound(s: &str, tz: &FixedOffset) -> Option<Bound> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Bound::Date(date));
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(s) {
        return Some(Bound::Instant(instant));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .and_then(|naive| naive.and_local_timezone(*tz).single())
        .map(Bound::Instant)
}

pub(super) fn start_of_day(date: NaiveDate, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    date.and_hms_opt(0, 0, 0)?.and_local_timezone(*tz).single()
}

pub(super) fn end_of_day(date: NaiveDate, tz: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    date.and_hms_opt(23, 59, 59)?.and_local_timezone(*tz).single()
}

/// First day of the `unit` period containing `date`
fn period_start(date: NaiveDate, unit: Unit, week_start: WeekStart) -> Option<NaiveDate> {
    match unit {
        Unit::Day => Some(date),
        Unit::Week => {
            let offset = match week_start {
                WeekStart::Monday => date.weekday().num_days_from_monday(),
                WeekStart::Sunday => date.weekday().num_days_from_sunday(),
            };
            date.checked_sub_signed(Duration::days(i64::from(offset)))
        }
        Unit::Month => date.with_day(1),
        Unit::Quarter => {
            let quarter_start_month = ((date.month() - 1) / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), quarter_start_month, 1)
        }
        Unit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
    }
}

/// Move a period start by `n` whole periods (negative goes back)
fn shift_period(start: NaiveDate, unit: Unit, n: i32) -> Option<NaiveDate> {
    match unit.months() {
        Some(months) => {
            let total = months.checked_mul(n.unsigned_abs())?;
            if n >= 0 {
                start.checked_add_months(Months::new(total))
            } else {
                start.checked_sub_months(Months::new(total))
            }
        }
        None => {
            let days = if unit == Unit::Week { 7 } else { 1 };
            start.checked_add_signed(Duration::days(i64::from(n) * days))
        }
    }
}

/// First and last calendar day of the period `offset` periods away from the
/// one containing `anchor`
pub(super) fn period_bounds(
    anchor: NaiveDate,
    unit: Unit,
    offset: i32,
    week_start: WeekStart,
) -> Option<(NaiveDate, NaiveDate)> {
    let start = shift_period(period_start(anchor, unit, week_start)?, unit, offset)?;
    let last = shift_period(start, unit, 1)?.pred_opt()?;
    Some((start, last))
}

/// `now` moved back by `n` units, with calendar arithmetic for month-based
/// units (clamped to the last day of shorter months)
pub(super) fn trailing_start(
    now: DateTime<FixedOffset>,
    unit: Unit,
    n: u32,
) -> Option<DateTime<FixedOffset>> {
    match unit.months() {
        Some(months) => now.checked_sub_months(Months::new(months.checked_mul(n)?)),
        None => {
            let days = if unit == Unit::Week { 7 } else { 1 };
            now.checked_sub_signed(Duration::days(i64::from(n) * days))
        }
    }
}
