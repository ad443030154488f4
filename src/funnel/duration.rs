//! ISO-8601 durations (`P7D`, `PT12H`, `P1Y2M3W4DT5H6M7.5S`)
//!
//! Calendar components are fixed: a year is 365 days and a month 30 days.

use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;

use super::error::FunnelError;

static ISO_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$",
    )
    .unwrap()
});

const SECONDS_PER_UNIT: [i64; 6] = [365 * 86_400, 30 * 86_400, 7 * 86_400, 86_400, 3_600, 60];

/// Parse a positive ISO-8601 duration
pub fn parse_duration(value: &str) -> Result<Duration, FunnelError> {
    let invalid = |reason: &str| FunnelError::InvalidDuration {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let text = value.trim();
    let caps = ISO_DURATION
        .captures(text)
        .ok_or_else(|| invalid("expected PnYnMnWnDTnHnMnS"))?;
    if caps.iter().skip(1).all(|c| c.is_none()) {
        return Err(invalid("no duration components"));
    }
    if text.to_ascii_uppercase().ends_with('T') {
        return Err(invalid("time designator without components"));
    }

    let mut millis: i64 = 0;
    for (i, unit_seconds) in SECONDS_PER_UNIT.iter().enumerate() {
        if let Some(m) = caps.get(i + 1) {
            let n: i64 = m.as_str().parse().map_err(|_| invalid("component too large"))?;
            millis = n
                .checked_mul(unit_seconds * 1000)
                .and_then(|v| millis.checked_add(v))
                .ok_or_else(|| invalid("duration too large"))?;
        }
    }
    if let Some(m) = caps.get(7) {
        let seconds: f64 = m.as_str().parse().map_err(|_| invalid("bad seconds"))?;
        let ms = (seconds * 1000.0).round();
        if !ms.is_finite() || ms >= i64::MAX as f64 {
            return Err(invalid("duration too large"));
        }
        millis = millis
            .checked_add(ms as i64)
            .ok_or_else(|| invalid("duration too large"))?;
    }

    if millis == 0 {
        return Err(invalid("duration must be greater than zero"));
    }
    Ok(Duration::milliseconds(millis))
}
