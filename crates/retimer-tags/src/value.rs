//! Typed tag values and their native text representations.

use crate::tag::{Awareness, Precision, TagId, ValueKind};
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// EXIF and QuickTime date-time layout.
pub const EXIF_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
/// XMP date-time layout.
pub const XMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";
/// IPTC date layout.
pub const IPTC_DATE_FORMAT: &str = "%Y:%m:%d";
/// IPTC time layout.
pub const IPTC_TIME_FORMAT: &str = "%H:%M:%S";

/// A parsed tag value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    /// Wall-clock date-time without a zone.
    Naive(NaiveDateTime),
    /// Date-time with its UTC offset.
    Aware(DateTime<FixedOffset>),
    /// Date half of a split pair.
    Date(NaiveDate),
    /// Time half of a split pair.
    Time(NaiveTime),
    /// Whole hours east of UTC.
    Hours(i64),
    /// Free text.
    Text(String),
}

static XMP_DATE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})[-:](\d{2})[-:](\d{2})[T ](\d{2}):(\d{2})(?::(\d{2})(?:\.(\d{1,9}))?)?\s*(Z|[+-]\d{2}:?\d{2})?$",
    )
    .expect("failed to compile XMP date regex")
});

static IPTC_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})[-:]?(\d{2})[-:]?(\d{2})").expect("failed to compile IPTC date regex")
});

static IPTC_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2}):?(\d{2}):?(\d{2})").expect("failed to compile IPTC time regex")
});

fn number(caps: &regex::Captures<'_>, i: usize) -> u32 {
    caps.get(i)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

fn parse_zone(text: &str) -> Option<FixedOffset> {
    if text == "Z" {
        return FixedOffset::east_opt(0);
    }
    let sign = if text.starts_with('-') { -1 } else { 1 };
    let digits: String = text[1..].chars().filter(|c| c.is_ascii_digit()).collect();
    let hours: i32 = digits.get(..2)?.parse().ok()?;
    let minutes: i32 = digits.get(2..4)?.parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Parse an XMP date-time. A missing offset means UTC.
pub fn parse_xmp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let caps = XMP_DATE_TIME_RE.captures(raw.trim())?;
    let date = NaiveDate::from_ymd_opt(
        caps.get(1)?.as_str().parse().ok()?,
        number(&caps, 2),
        number(&caps, 3),
    )?;
    let nanos = caps
        .get(7)
        .map(|m| {
            let digits = m.as_str();
            let value: u32 = digits.parse().unwrap_or(0);
            value * 10u32.pow(9 - digits.len() as u32)
        })
        .unwrap_or(0);
    let time =
        NaiveTime::from_hms_nano_opt(number(&caps, 4), number(&caps, 5), number(&caps, 6), nanos)?;
    let offset = match caps.get(8) {
        Some(zone) => parse_zone(zone.as_str())?,
        None => FixedOffset::east_opt(0)?,
    };
    date.and_time(time).and_local_timezone(offset).single()
}

fn parse_iptc_date(raw: &str) -> Option<NaiveDate> {
    let caps = IPTC_DATE_RE.captures(raw.trim())?;
    NaiveDate::from_ymd_opt(
        caps.get(1)?.as_str().parse().ok()?,
        number(&caps, 2),
        number(&caps, 3),
    )
}

fn parse_iptc_time(raw: &str) -> Option<NaiveTime> {
    let caps = IPTC_TIME_RE.captures(raw.trim())?;
    NaiveTime::from_hms_opt(number(&caps, 1), number(&caps, 2), number(&caps, 3))
}

fn parse_clip(raw: &str) -> Option<TagValue> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(TagValue::Aware(ts));
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(TagValue::Aware(ts));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(TagValue::Naive)
}

impl TagValue {
    /// Parse a raw tag string according to the tag's storage kind.
    pub fn parse(tag: TagId, raw: &str) -> Result<Self> {
        let invalid = || Error::parse_error(tag.key(), format!("unrecognized value {raw:?}"));
        let text = raw.trim_matches(|c: char| c.is_whitespace() || c == '\0');

        match tag.kind() {
            ValueKind::ExifDateTime | ValueKind::UtcDateTime => {
                NaiveDateTime::parse_from_str(text, EXIF_FORMAT)
                    .map(Self::Naive)
                    .map_err(|e| Error::parse_error(tag.key(), format!("{raw:?}: {e}")))
            }
            ValueKind::OffsetHours => text
                .split_whitespace()
                .next()
                .and_then(|token| token.parse::<i64>().ok())
                .map(Self::Hours)
                .ok_or_else(invalid),
            ValueKind::XmpDateTime => parse_xmp(text).map(Self::Aware).ok_or_else(invalid),
            ValueKind::IptcDate => parse_iptc_date(text).map(Self::Date).ok_or_else(invalid),
            ValueKind::IptcTime => parse_iptc_time(text).map(Self::Time).ok_or_else(invalid),
            ValueKind::Text => Ok(Self::Text(text.to_string())),
            ValueKind::Clip => parse_clip(text).ok_or_else(invalid),
        }
    }

    /// Render in the tag family's native layout.
    pub fn to_native(&self) -> String {
        match self {
            Self::Naive(ts) => ts.format(EXIF_FORMAT).to_string(),
            Self::Aware(ts) => ts.format(XMP_FORMAT).to_string(),
            Self::Date(date) => date.format(IPTC_DATE_FORMAT).to_string(),
            Self::Time(time) => time.format(IPTC_TIME_FORMAT).to_string(),
            Self::Hours(hours) => hours.to_string(),
            Self::Text(text) => text.clone(),
        }
    }

    pub fn as_naive(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Naive(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_aware(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::Aware(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Self::Time(time) => Some(*time),
            _ => None,
        }
    }

    pub fn as_hours(&self) -> Option<i64> {
        match self {
            Self::Hours(hours) => Some(*hours),
            _ => None,
        }
    }
}

/// A parsed tag value with the static properties of its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampCandidate {
    pub tag: TagId,
    pub value: TagValue,
    pub precision: Precision,
    pub awareness: Awareness,
}

impl TimestampCandidate {
    pub fn new(tag: TagId, value: TagValue) -> Self {
        Self {
            tag,
            value,
            precision: tag.kind().precision(),
            awareness: tag.kind().awareness(),
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_native())
    }
}
