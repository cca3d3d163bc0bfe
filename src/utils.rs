/// Utility functions for durations and timestamps
use thiserror::Error;
use time::{format_description, Duration, OffsetDateTime};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Truncate a timestamp down to a multiple of `period` since the Unix epoch
///
/// Non-positive periods return the timestamp unchanged.
pub fn truncate(dt: OffsetDateTime, period: Duration) -> OffsetDateTime {
    let period_ns = period.whole_nanoseconds();
    if period_ns <= 0 {
        return dt;
    }
    let nanos = dt.unix_timestamp_nanos();
    OffsetDateTime::from_unix_timestamp_nanos(nanos - nanos.rem_euclid(period_ns)).unwrap_or(dt)
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("malformed duration {0:?}, want e.g. 1d12h30m15s")]
    Malformed(String),

    #[error("duration {0:?} is out of range")]
    Overflow(String),
}

/// Parse a compact duration such as `7d`, `1h30m` or `-90s`
///
/// Units are `d` (24 hours), `h`, `m` and `s`, each at most once and in that
/// order. A bare `0` is accepted as zero.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    let (negative, body) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    if body == "0" {
        return Ok(Duration::ZERO);
    }

    const UNITS: [(char, i64); 4] = [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)];
    let malformed = || DurationError::Malformed(input.to_string());

    let mut total: i64 = 0;
    let mut next_unit = 0;
    let mut digits = String::new();
    for c in body.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let offset = UNITS[next_unit..]
            .iter()
            .position(|(unit, _)| *unit == c)
            .ok_or_else(malformed)?;
        if digits.is_empty() {
            return Err(malformed());
        }

        let idx = next_unit + offset;
        let count: i64 = digits
            .parse()
            .map_err(|_| DurationError::Overflow(input.to_string()))?;
        total = count
            .checked_mul(UNITS[idx].1)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| DurationError::Overflow(input.to_string()))?;

        digits.clear();
        next_unit = idx + 1;
    }

    if !digits.is_empty() || next_unit == 0 {
        return Err(malformed());
    }

    let secs = if negative { -total } else { total };
    Ok(Duration::seconds(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compact_durations() {
        assert_eq!(parse_duration("7d"), Ok(Duration::days(7)));
        assert_eq!(
            parse_duration("1d2h3m4s"),
            Ok(Duration::seconds(86_400 + 2 * 3_600 + 3 * 60 + 4))
        );
        assert_eq!(parse_duration("90m"), Ok(Duration::minutes(90)));
        assert_eq!(parse_duration("-30s"), Ok(Duration::seconds(-30)));
        assert_eq!(parse_duration("+1h"), Ok(Duration::hours(1)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        for bad in ["5", "h", "1h1d", "1h1h", "1w", "1.5h", "1h 2m", "-"] {
            assert!(parse_duration(bad).is_err(), "accepted {bad:?}");
        }
        assert!(matches!(
            parse_duration("99999999999999999999d"),
            Err(DurationError::Overflow(_))
        ));
    }

    #[test]
    fn truncates_to_period() {
        let dt = OffsetDateTime::from_unix_timestamp(1_700_000_123).unwrap();
        let want = OffsetDateTime::from_unix_timestamp(1_700_000_100).unwrap();
        assert_eq!(truncate(dt, Duration::minutes(1)), want);
        assert_eq!(truncate(dt, Duration::ZERO), dt);
    }

    #[test]
    fn formats_datetime() {
        let dt = OffsetDateTime::from_unix_timestamp(0).unwrap();
        assert_eq!(format_datetime(&dt), "01.01.1970 - 00:00:00");
    }
}
