//! Timestamp, UTC offset and correction-delta helpers.
//!
//! Offsets are always [`FixedOffset`]s: every namespace retimer touches stores
//! either a naive local time or a fixed numeric offset, never a zone name.

use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};

const NANOS_PER_SEC: i128 = 1_000_000_000;
const SECS_PER_HOUR: i32 = 3600;
const MAX_OFFSET_SECS: i32 = 24 * SECS_PER_HOUR;

/// Round a timestamp to the nearest whole second. Exact half-second ties round up.
pub fn round_to_second<Tz: TimeZone>(ts: DateTime<Tz>) -> DateTime<Tz> {
    let nanos = ts.timestamp_subsec_nanos();
    let truncated = ts - TimeDelta::nanoseconds(i64::from(nanos));
    if nanos >= 500_000_000 {
        truncated + TimeDelta::seconds(1)
    } else {
        truncated
    }
}

/// UTC.
pub fn utc() -> FixedOffset {
    Utc.fix()
}

/// The current UTC offset of the running environment.
pub fn local_offset() -> FixedOffset {
    Local::now().offset().fix()
}

/// Build an offset from a whole number of hours.
pub fn offset_from_hours(hours: i64) -> Result<FixedOffset> {
    i32::try_from(hours)
        .ok()
        .and_then(|h| h.checked_mul(SECS_PER_HOUR))
        .filter(|secs| secs.abs() < MAX_OFFSET_SECS)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| Error::invalid_offset(format!("{hours} hours")))
}

/// Build an offset from seconds east of UTC.
pub fn offset_from_seconds(secs: i64) -> Result<FixedOffset> {
    i32::try_from(secs)
        .ok()
        .filter(|s| s.abs() < MAX_OFFSET_SECS)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| Error::invalid_offset(format!("{secs} seconds")))
}

/// Whole hours of an offset, rounded half-to-even.
pub fn whole_hours(offset: FixedOffset) -> i64 {
    (f64::from(offset.local_minus_utc()) / f64::from(SECS_PER_HOUR)).round_ties_even() as i64
}

/// Round an offset to whole hours.
pub fn round_to_whole_hour(offset: FixedOffset) -> FixedOffset {
    offset_from_hours(whole_hours(offset)).unwrap_or(offset)
}

/// Parse a UTC offset.
///
/// Accepts `Z`, `UTC`, `±HH:MM`, `±HHMM` and a (possibly fractional) number of
/// hours such as `+2`, `-5.5`.
///
/// # Examples
///
/// ```
/// use retimer_common::time::parse_offset;
///
/// assert_eq!(parse_offset("+01:00").unwrap().local_minus_utc(), 3600);
/// assert_eq!(parse_offset("-5.5").unwrap().local_minus_utc(), -19800);
/// assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
/// ```
pub fn parse_offset(text: &str) -> Result<FixedOffset> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("z") || text.eq_ignore_ascii_case("utc") {
        return Ok(utc());
    }

    let (sign, body) = match text.as_bytes().first() {
        Some(b'+') => (1, &text[1..]),
        Some(b'-') => (-1, &text[1..]),
        _ => (1, text),
    };

    let secs = if let Some((h, m)) = body.split_once(':') {
        let h: i32 = h.parse().map_err(|_| Error::invalid_offset(text))?;
        let m: i32 = m.parse().map_err(|_| Error::invalid_offset(text))?;
        if m >= 60 {
            return Err(Error::invalid_offset(text));
        }
        h * SECS_PER_HOUR + m * 60
    } else if body.len() == 4 && body.bytes().all(|b| b.is_ascii_digit()) {
        let h: i32 = body[..2].parse().map_err(|_| Error::invalid_offset(text))?;
        let m: i32 = body[2..].parse().map_err(|_| Error::invalid_offset(text))?;
        h * SECS_PER_HOUR + m * 60
    } else {
        let hours: f64 = body.parse().map_err(|_| Error::invalid_offset(text))?;
        if !hours.is_finite() || hours.abs() >= 24.0 {
            return Err(Error::invalid_offset(text));
        }
        (hours * f64::from(SECS_PER_HOUR)).round() as i32
    };

    offset_from_seconds(i64::from(sign * secs)).map_err(|_| Error::invalid_offset(text))
}

/// Parse a user-typed timestamp.
///
/// RFC 3339 and `YYYY-MM-DD HH:MM:SS[.f][±HH:MM]` are accepted; a value without
/// an offset is interpreted in `default_offset`.
pub fn parse_timestamp(text: &str, default_offset: FixedOffset) -> Result<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Ok(ts);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"] {
        if let Ok(ts) = DateTime::parse_from_str(text, fmt) {
            return Ok(ts);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y:%m:%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            if let Some(ts) = default_offset.from_local_datetime(&naive).single() {
                return Ok(ts);
            }
        }
    }
    Err(Error::invalid_timestamp(text))
}

/// Parse a decimal number scaled by `unit_nanos` without going through floats.
fn parse_scaled(number: &str, unit_nanos: i128) -> Option<i128> {
    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let int_value: i128 = if int_part.is_empty() { 0 } else { int_part.parse().ok()? };
    let mut total = int_value.checked_mul(unit_nanos)?;
    if !frac_part.is_empty() {
        let digits = frac_part.len().min(18) as u32;
        let frac: i128 = frac_part[..digits as usize].parse().ok()?;
        total = total.checked_add(frac.checked_mul(unit_nanos)? / 10i128.pow(digits))?;
    }
    Some(total)
}

fn unit_nanos(unit: &str) -> Option<i128> {
    let secs: i128 = match unit.to_ascii_lowercase().as_str() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => 60,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86_400,
        "w" | "wk" | "wks" | "week" | "weeks" => 604_800,
        _ => return None,
    };
    Some(secs * NANOS_PER_SEC)
}

fn parse_clock(clock: &str) -> Option<i128> {
    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => ("0", *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => return None,
    };
    let hours = parse_scaled(hours, 3600 * NANOS_PER_SEC)?;
    let minutes = parse_scaled(minutes, 60 * NANOS_PER_SEC)?;
    let seconds = parse_scaled(seconds, NANOS_PER_SEC)?;
    hours.checked_add(minutes)?.checked_add(seconds)
}

/// Parse a correction delta.
///
/// Accepted forms: `0`, a clock `H:MM:SS[.f]` or `M:SS`, unit terms such as
/// `1d 2h 30m 15s`, `1.5h`, `90 seconds`, and any mix of those, each with an
/// optional leading sign applying to the whole value.
///
/// # Examples
///
/// ```
/// use chrono::TimeDelta;
/// use retimer_common::time::parse_delta;
///
/// assert_eq!(parse_delta("-2h").unwrap(), TimeDelta::hours(-2));
/// assert_eq!(parse_delta("1:30:00").unwrap(), TimeDelta::minutes(90));
/// assert_eq!(parse_delta("1d 0:00:05").unwrap(), TimeDelta::seconds(86_405));
/// ```
pub fn parse_delta(text: &str) -> Result<TimeDelta> {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(Error::invalid_delta(text));
    }

    let mut total: i128 = 0;
    let mut chars = rest.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() || c == ',' {
            chars.next();
            continue;
        }
        let mut number_end = start;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_ascii_digit() || c == '.' || c == ':' {
                number_end = i + c.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let number = &rest[start..number_end];
        if number.is_empty() {
            return Err(Error::invalid_delta(text));
        }

        let term = if number.contains(':') {
            parse_clock(number)
        } else {
            while chars.peek().is_some_and(|&(_, c)| c == ' ') {
                chars.next();
            }
            let unit_start = chars.peek().map(|&(i, _)| i).unwrap_or(rest.len());
            let mut unit_end = unit_start;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_ascii_alphabetic() {
                    unit_end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            unit_nanos(&rest[unit_start..unit_end]).and_then(|unit| parse_scaled(number, unit))
        };

        total = term
            .and_then(|t| total.checked_add(t))
            .ok_or_else(|| Error::invalid_delta(text))?;
    }

    if negative {
        total = -total;
    }
    i64::try_from(total)
        .map(TimeDelta::nanoseconds)
        .map_err(|_| Error::invalid_delta(text))
}

/// Render a delta as `[-][Nd ]H:MM:SS[.fraction]`.
///
/// # Examples
///
/// ```
/// use chrono::TimeDelta;
/// use retimer_common::time::format_delta;
///
/// assert_eq!(format_delta(TimeDelta::zero()), "0:00:00");
/// assert_eq!(format_delta(TimeDelta::minutes(-90)), "-1:30:00");
/// assert_eq!(format_delta(TimeDelta::hours(26)), "1d 2:00:00");
/// ```
pub fn format_delta(delta: TimeDelta) -> String {
    let negative = delta < TimeDelta::zero();
    let magnitude = if negative { -delta } else { delta };

    let total_secs = magnitude.num_seconds();
    let nanos = magnitude.subsec_nanos();
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if days > 0 {
        out.push_str(&format!("{days}d "));
    }
    out.push_str(&format!("{hours}:{minutes:02}:{seconds:02}"));
    if nanos != 0 {
        let frac = format!("{nanos:09}");
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out
}

/// Exact length of a delta in nanoseconds.
pub fn delta_nanos(delta: TimeDelta) -> i128 {
    i128::from(delta.num_seconds()) * NANOS_PER_SEC + i128::from(delta.subsec_nanos())
}

/// Build a delta from nanoseconds, `None` when out of range.
pub fn delta_from_nanos(nanos: i128) -> Option<TimeDelta> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SEC)).ok()?;
    let subsec = u32::try_from(nanos.rem_euclid(NANOS_PER_SEC)).ok()?;
    TimeDelta::new(secs, subsec)
}

/// Nanoseconds since the Unix epoch.
pub fn instant_nanos<Tz: TimeZone>(ts: &DateTime<Tz>) -> i128 {
    i128::from(ts.timestamp()) * NANOS_PER_SEC + i128::from(ts.timestamp_subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32, nanos: u32) -> DateTime<FixedOffset> {
        NaiveDate::from_ymd_opt(2021, 6, 1)
            .unwrap()
            .and_hms_nano_opt(h, m, s, nanos)
            .unwrap()
            .and_local_timezone(utc())
            .unwrap()
    }

    #[test]
    fn test_round_to_second() {
        assert_eq!(round_to_second(at(10, 0, 0, 499_999_999)), at(10, 0, 0, 0));
        assert_eq!(round_to_second(at(10, 0, 0, 500_000_000)), at(10, 0, 1, 0));
        assert_eq!(round_to_second(at(10, 59, 59, 700_000_000)), at(11, 0, 0, 0));
        assert_eq!(round_to_second(at(10, 0, 0, 0)), at(10, 0, 0, 0));
    }

    #[test]
    fn test_nanos_conversions() {
        let delta = TimeDelta::milliseconds(-1500);
        assert_eq!(delta_nanos(delta), -1_500_000_000);
        assert_eq!(delta_from_nanos(-1_500_000_000), Some(delta));
        assert_eq!(delta_from_nanos(i128::MAX), None);
        assert_eq!(instant_nanos(&at(0, 0, 1, 5)) - instant_nanos(&at(0, 0, 0, 0)), 1_000_000_005);
    }

    #[test]
    fn test_whole_hours_rounds_half_to_even() {
        assert_eq!(whole_hours(parse_offset("+01:00").unwrap()), 1);
        assert_eq!(whole_hours(parse_offset("+05:30").unwrap()), 6);
        assert_eq!(whole_hours(parse_offset("+00:30").unwrap()), 0);
        assert_eq!(whole_hours(parse_offset("-03:30").unwrap()), -4);
    }

    #[test]
    fn test_parse_offset_forms() {
        assert_eq!(parse_offset("+0100").unwrap().local_minus_utc(), 3600);
        assert_eq!(parse_offset("-08:00").unwrap().local_minus_utc(), -28800);
        assert_eq!(parse_offset("2").unwrap().local_minus_utc(), 7200);
        assert_eq!(parse_offset("utc").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("+25:00").is_err());
        assert!(parse_offset("+01:75").is_err());
        assert!(parse_offset("east").is_err());
    }

    #[test]
    fn test_offset_from_hours_bounds() {
        assert_eq!(offset_from_hours(-5).unwrap().local_minus_utc(), -18000);
        assert!(offset_from_hours(24).is_err());
        assert!(offset_from_seconds(86_400).is_err());
    }

    #[test]
    fn test_parse_timestamp_naive_uses_default() {
        let plus_two = parse_offset("+02:00").unwrap();
        let ts = parse_timestamp("2021-06-01 10:00:00", plus_two).unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 7200);
        assert_eq!(ts.to_rfc3339(), "2021-06-01T10:00:00+02:00");

        let ts = parse_timestamp("2021-06-01T08:00:00+00:00", plus_two).unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 0);

        assert!(parse_timestamp("June 1st", plus_two).is_err());
    }

    #[test]
    fn test_parse_delta_forms() {
        assert_eq!(parse_delta("0").unwrap(), TimeDelta::zero());
        assert_eq!(parse_delta("  -0 ").unwrap(), TimeDelta::zero());
        assert_eq!(parse_delta("90").unwrap(), TimeDelta::seconds(90));
        assert_eq!(parse_delta("1h30m").unwrap(), TimeDelta::minutes(90));
        assert_eq!(parse_delta("1.5h").unwrap(), TimeDelta::minutes(90));
        assert_eq!(parse_delta("2 hours, 5 minutes").unwrap(), TimeDelta::minutes(125));
        assert_eq!(parse_delta("- 1w").unwrap(), TimeDelta::weeks(-1));
        assert_eq!(parse_delta("5:00").unwrap(), TimeDelta::minutes(5));
        assert_eq!(parse_delta("0:00:00.25").unwrap(), TimeDelta::milliseconds(250));
    }

    #[test]
    fn test_parse_delta_rejects_garbage() {
        assert!(parse_delta("").is_err());
        assert!(parse_delta("-").is_err());
        assert!(parse_delta("soon").is_err());
        assert!(parse_delta("3 fortnights").is_err());
        assert!(parse_delta("1:2:3:4").is_err());
    }

    #[test]
    fn test_format_delta_parses_back() {
        for delta in [
            TimeDelta::zero(),
            TimeDelta::seconds(-7200),
            TimeDelta::seconds(86_400 * 3 + 61),
            TimeDelta::milliseconds(-1500),
            TimeDelta::nanoseconds(123_456_789),
        ] {
            let text = format_delta(delta);
            assert_eq!(parse_delta(&text).unwrap(), delta, "{text}");
        }
    }

    #[test]
    fn test_format_delta_fraction() {
        assert_eq!(format_delta(TimeDelta::milliseconds(1500)), "0:00:01.5");
    }
}
