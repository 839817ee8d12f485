//! Per-file reconciliation state.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, TimeZone};
use retimer_common::time::{format_delta, offset_from_hours, utc};
use retimer_tags::{Namespace, TagId, TagValue, TimestampCandidate, ValueKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Which evidence supplied a file's canonical timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampSource {
    /// `Exif.Photo.DateTimeOriginal` with its offset tag.
    ExifOriginal,
    /// AVCHD playlist clip record.
    Avchd,
    /// `QuickTime:CreateDate`.
    QuickTime,
    /// Filesystem modification time.
    FileModified,
}

impl TimestampSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExifOriginal => "exif",
            Self::Avchd => "avchd",
            Self::QuickTime => "quicktime",
            Self::FileModified => "mtime",
        }
    }
}

impl fmt::Display for TimestampSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One media file and everything known about its timestamps.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub path: PathBuf,
    /// Path relative to the common prefix of the loaded set.
    pub display_path: String,
    pub tags: BTreeMap<TagId, TagValue>,
    pub mtime: Option<DateTime<FixedOffset>>,
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub source: Option<TimestampSource>,
    pub delta: TimeDelta,
    pub locked: bool,
    /// Non-fatal problems found during the last reload or write.
    pub issues: Vec<String>,
    written: bool,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>, display_path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            display_path: display_path.into(),
            tags: BTreeMap::new(),
            mtime: None,
            timestamp: None,
            source: None,
            delta: TimeDelta::zero(),
            locked: false,
            issues: Vec::new(),
            written: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forget everything read from disk and start over from `default_delta`.
    pub fn clear(&mut self, default_delta: TimeDelta) {
        self.tags.clear();
        self.mtime = None;
        self.timestamp = None;
        self.source = None;
        self.delta = default_delta;
        self.locked = false;
        self.issues.clear();
        self.written = false;
    }

    pub fn tag(&self, tag: TagId) -> Option<&TagValue> {
        self.tags.get(&tag)
    }

    /// Whether the file was written since its last reload.
    pub fn is_written(&self) -> bool {
        self.written
    }

    pub(crate) fn mark_written(&mut self) {
        self.written = true;
    }

    /// The EXIF offset tag as a [`FixedOffset`], UTC when absent.
    pub fn exif_offset(&self) -> FixedOffset {
        self.tag(TagId::ExifTimeZoneOffset)
            .and_then(TagValue::as_hours)
            .and_then(|hours| offset_from_hours(hours).ok())
            .unwrap_or_else(utc)
    }

    /// Resolve a timestamp tag to an aware value.
    ///
    /// EXIF values take the offset tag, IPTC dates are combined with their
    /// time partner in `local_offset`, QuickTime values are UTC. Time halves
    /// and non-timestamp tags resolve to `None`.
    pub fn resolve_offset_aware(
        &self,
        tag: TagId,
        local_offset: FixedOffset,
    ) -> Option<DateTime<FixedOffset>> {
        let value = self.tag(tag)?;
        match tag.kind() {
            ValueKind::ExifDateTime => attach(value.as_naive()?, self.exif_offset()),
            ValueKind::XmpDateTime => value.as_aware(),
            ValueKind::IptcDate => {
                let time = self.tag(tag.time_partner()?)?.as_time()?;
                attach(value.as_date()?.and_time(time), local_offset)
            }
            ValueKind::UtcDateTime => attach(value.as_naive()?, utc()),
            ValueKind::Clip => match value {
                TagValue::Aware(ts) => Some(*ts),
                TagValue::Naive(naive) => attach(*naive, utc()),
                _ => None,
            },
            ValueKind::IptcTime | ValueKind::OffsetHours | ValueKind::Text => None,
        }
    }

    /// Every populated tag with its precision and awareness.
    pub fn candidates(&self) -> Vec<TimestampCandidate> {
        self.tags
            .iter()
            .map(|(tag, value)| TimestampCandidate::new(*tag, value.clone()))
            .collect()
    }

    /// Tags of one namespace.
    pub fn namespace_tags(&self, namespace: Namespace) -> impl Iterator<Item = (TagId, &TagValue)> {
        self.tags
            .iter()
            .filter(move |(tag, _)| tag.namespace() == namespace)
            .map(|(tag, value)| (*tag, value))
    }

    /// The canonical timestamp moved into `target` and shifted by the delta.
    pub fn corrected_timestamp(&self, target: FixedOffset) -> Option<DateTime<FixedOffset>> {
        self.timestamp
            .map(|ts| ts.with_timezone(&target) + self.delta)
    }

    pub fn summary(&self, target: FixedOffset) -> FileSummary {
        FileSummary {
            path: self.path.clone(),
            display_path: self.display_path.clone(),
            timestamp: self.timestamp,
            source: self.source,
            delta: format_delta(self.delta),
            corrected: self.corrected_timestamp(target),
            locked: self.locked,
            tags: self
                .tags
                .iter()
                .map(|(tag, value)| (tag.key().to_string(), value.to_native()))
                .collect(),
            issues: self.issues.clone(),
        }
    }
}

fn attach(naive: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    offset.from_local_datetime(&naive).single()
}

/// Serializable view of a [`MediaFile`].
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub display_path: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub source: Option<TimestampSource>,
    pub delta: String,
    pub corrected: Option<DateTime<FixedOffset>>,
    pub locked: bool,
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use retimer_common::time::parse_offset;

    fn naive(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn aware(text: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(text).unwrap()
    }

    #[test]
    fn test_exif_resolution_uses_offset_tag() {
        let mut file = MediaFile::new("/a.jpg", "a.jpg");
        file.tags.insert(
            TagId::ExifDateTimeOriginal,
            TagValue::Naive(naive("2020-06-01 10:00:00")),
        );
        let local = parse_offset("+05:00").unwrap();
        assert_eq!(
            file.resolve_offset_aware(TagId::ExifDateTimeOriginal, local),
            Some(aware("2020-06-01T10:00:00+00:00"))
        );

        file.tags.insert(TagId::ExifTimeZoneOffset, TagValue::Hours(2));
        let ts = file
            .resolve_offset_aware(TagId::ExifDateTimeOriginal, local)
            .unwrap();
        assert_eq!(ts, aware("2020-06-01T10:00:00+02:00"));
        assert_eq!(ts.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_iptc_pair_needs_both_halves() {
        let mut file = MediaFile::new("/a.jpg", "a.jpg");
        let local = parse_offset("+01:00").unwrap();
        file.tags.insert(
            TagId::IptcDateCreated,
            TagValue::Date(NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()),
        );
        assert_eq!(file.resolve_offset_aware(TagId::IptcDateCreated, local), None);

        file.tags.insert(
            TagId::IptcTimeCreated,
            TagValue::Time(NaiveTime::from_hms_opt(10, 0, 0).unwrap()),
        );
        assert_eq!(
            file.resolve_offset_aware(TagId::IptcDateCreated, local),
            Some(aware("2020-06-01T10:00:00+01:00"))
        );
        assert_eq!(file.resolve_offset_aware(TagId::IptcTimeCreated, local), None);
    }

    #[test]
    fn test_quicktime_is_utc() {
        let mut file = MediaFile::new("/a.mov", "a.mov");
        file.tags.insert(
            TagId::QuickTimeCreateDate,
            TagValue::Naive(naive("2021-06-01 08:00:00")),
        );
        assert_eq!(
            file.resolve_offset_aware(TagId::QuickTimeCreateDate, parse_offset("-07:00").unwrap()),
            Some(aware("2021-06-01T08:00:00Z"))
        );
    }

    #[test]
    fn test_corrected_timestamp_and_clear() {
        let mut file = MediaFile::new("/a.jpg", "a.jpg");
        assert_eq!(file.corrected_timestamp(utc()), None);

        file.timestamp = Some(aware("2020-06-01T10:00:00+02:00"));
        file.delta = TimeDelta::hours(-1);
        file.source = Some(TimestampSource::ExifOriginal);
        let corrected = file.corrected_timestamp(utc()).unwrap();
        assert_eq!(corrected, aware("2020-06-01T07:00:00Z"));
        assert_eq!(corrected.offset().local_minus_utc(), 0);

        file.mark_written();
        file.issues.push("oops".into());
        file.clear(TimeDelta::minutes(5));
        assert!(file.timestamp.is_none());
        assert!(file.source.is_none());
        assert!(file.issues.is_empty());
        assert!(!file.is_written());
        assert_eq!(file.delta, TimeDelta::minutes(5));
    }

    #[test]
    fn test_summary_serializes() {
        let mut file = MediaFile::new("/photos/a.jpg", "a.jpg");
        file.tags.insert(TagId::ExifTimeZoneOffset, TagValue::Hours(1));
        file.timestamp = Some(aware("2020-06-01T10:00:00+01:00"));
        file.source = Some(TimestampSource::ExifOriginal);

        let json = serde_json::to_value(file.summary(utc())).unwrap();
        assert_eq!(json["source"], "exif-original");
        assert_eq!(json["delta"], "0:00:00");
        assert_eq!(json["tags"]["Exif.Image.TimeZoneOffset"], "1");
        assert!(json.get("issues").is_none());
        assert_eq!(file.candidates().len(), 1);
    }
}
