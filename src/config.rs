//! Compiler configuration

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Deserializer};

/// First day of a calendar week for `this/last/next week`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

/// Compiler configuration loaded from YAML, falling back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Calendar timezone for date ranges: `UTC`, `Z` or `±HH:MM`
    #[serde(default = "default_timezone", deserialize_with = "deserialize_offset")]
    pub timezone: FixedOffset,
    #[serde(default)]
    pub week_start: WeekStart,
}

fn default_timezone() -> FixedOffset {
    Utc.fix()
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            week_start: WeekStart::default(),
        }
    }
}

impl CompilerConfig {
    pub fn with_timezone(mut self, timezone: FixedOffset) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_week_start(mut self, week_start: WeekStart) -> Self {
        self.week_start = week_start;
        self
    }

    /// Apply `CUBEPLAN_TIMEZONE` and `CUBEPLAN_WEEK_START` overrides.
    ///
    /// Invalid values are logged and ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(tz) = std::env::var("CUBEPLAN_TIMEZONE") {
            match parse_offset(&tz) {
                Some(offset) => self.timezone = offset,
                None => tracing::warn!(value = %tz, "Ignoring invalid CUBEPLAN_TIMEZONE"),
            }
        }
        if let Ok(start) = std::env::var("CUBEPLAN_WEEK_START") {
            match start.to_lowercase().as_str() {
                "monday" => self.week_start = WeekStart::Monday,
                "sunday" => self.week_start = WeekStart::Sunday,
                _ => tracing::warn!(value = %start, "Ignoring invalid CUBEPLAN_WEEK_START"),
            }
        }
        self
    }
}

/// Parse `UTC`, `Z`, `+HH:MM`, `-HH:MM` or `+HHMM`
pub fn parse_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("utc") || s.eq_ignore_ascii_case("z") {
        return Some(Utc.fix());
    }
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn deserialize_offset<'de, D>(deserializer: D) -> Result<FixedOffset, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_offset(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timezone offset '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.timezone.local_minus_utc(), 0);
        assert_eq!(config.week_start, WeekStart::Monday);
    }

    #[test]
    fn test_parse_offsets() {
        assert_eq!(parse_offset("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_offset("+05:30").unwrap().local_minus_utc(), 19800);
        assert_eq!(parse_offset("-0800").unwrap().local_minus_utc(), -28800);
        assert!(parse_offset("Europe/Berlin").is_none());
        assert!(parse_offset("+25:00").is_none());
        assert!(parse_offset("").is_none());
    }

    #[test]
    fn test_deserialize_yaml() {
        let config: CompilerConfig =
            serde_yaml::from_str("timezone: \"-03:00\"\nweekStart: sunday\n").unwrap();
        assert_eq!(config.timezone.local_minus_utc(), -10800);
        assert_eq!(config.week_start, WeekStart::Sunday);
    }

    #[test]
    fn test_deserialize_rejects_bad_timezone() {
        let result: Result<CompilerConfig, _> = serde_yaml::from_str("timezone: Mars/Base\n");
        assert!(result.is_err());
    }
}
