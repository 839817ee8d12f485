//! Canonical timestamp reconciliation.
//!
//! Evidence is gathered from the metadata store (EXIF/XMP/IPTC), the AVCHD
//! playlist indexes, the external probe (QuickTime/Nikon) and the filesystem.
//! The canonical timestamp is the first available of:
//!
//! 1. `Exif.Photo.DateTimeOriginal`, aware through `Exif.Image.TimeZoneOffset`
//! 2. the AVCHD clip record
//! 3. `QuickTime:CreateDate` (UTC)
//! 4. the filesystem modification time

use crate::media::{MediaFile, TimestampSource};
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, Utc};
use retimer_avchd::{ClipTimestamp, MplDirectoryIndex};
use retimer_common::paths::is_clip_file;
use retimer_common::time::{offset_from_hours, utc};
use retimer_tags::{TagId, TagProbe, TagStoreProvider, TagValue};
use std::fs;
use tracing::{debug, warn};

const SECS_PER_HOUR: f64 = 3600.0;

/// Infer a whole-hour offset for a naive value.
///
/// The naive value is read as UTC and compared with `reference`; the
/// difference is rounded to the nearest hour (ties to even). Without a
/// reference the offset is UTC.
pub fn infer_offset(naive: NaiveDateTime, reference: Option<DateTime<FixedOffset>>) -> FixedOffset {
    let Some(reference) = reference else {
        return utc();
    };
    let diff = naive.and_utc() - reference.with_timezone(&Utc);
    let hours = (diff.num_seconds() as f64 / SECS_PER_HOUR).round_ties_even() as i64;
    offset_from_hours(hours).unwrap_or_else(|_| {
        warn!(hours, "Inferred offset out of range, assuming UTC");
        utc()
    })
}

/// Reads and reconciles timestamp evidence for one file at a time.
pub struct TagReconciler<'a> {
    store: &'a dyn TagStoreProvider,
    probe: &'a dyn TagProbe,
    local_offset: FixedOffset,
}

impl<'a> TagReconciler<'a> {
    pub fn new(
        store: &'a dyn TagStoreProvider,
        probe: &'a dyn TagProbe,
        local_offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            probe,
            local_offset,
        }
    }

    /// Re-read every source for `file` and select its canonical timestamp.
    ///
    /// Tag-level parse failures and unreadable metadata are recorded as
    /// issues on the file. An unreadable mtime or a missing tool fails the
    /// whole file.
    pub fn reload(
        &self,
        file: &mut MediaFile,
        avchd: &[MplDirectoryIndex],
        default_delta: TimeDelta,
    ) -> Result<()> {
        file.clear(default_delta);

        let modified = fs::metadata(&file.path)?.modified()?;
        let mtime = DateTime::<Utc>::from(modified).with_timezone(&self.local_offset);
        file.mtime = Some(mtime);

        self.read_store(file)?;
        self.infer_exif_offset(file);

        let exif = file.resolve_offset_aware(TagId::ExifDateTimeOriginal, self.local_offset);
        let (timestamp, source) = match exif {
            Some(ts) => (ts, TimestampSource::ExifOriginal),
            None => match self.fallback(file, avchd)? {
                Some(found) => found,
                None => (mtime, TimestampSource::FileModified),
            },
        };

        debug!(
            path = %file.path.display(),
            %timestamp,
            %source,
            tags = file.tags.len(),
            "Reconciled timestamp"
        );
        file.timestamp = Some(timestamp);
        file.source = Some(source);
        Ok(())
    }

    fn read_store(&self, file: &mut MediaFile) -> Result<()> {
        let store = match self.store.open(&file.path) {
            Ok(store) => store,
            Err(retimer_tags::Error::Unsupported { .. }) => {
                debug!(path = %file.path.display(), "No EXIF/XMP/IPTC metadata");
                return Ok(());
            }
            Err(e @ retimer_tags::Error::ToolFailed { .. }) => {
                warn!(path = %file.path.display(), error = %e, "Cannot read metadata");
                file.issues.push(e.to_string());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        for tag in TagId::store_tags() {
            let Some(raw) = store.get(tag) else {
                continue;
            };
            match TagValue::parse(tag, &raw) {
                Ok(value) => {
                    file.tags.insert(tag, value);
                }
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Skipping tag");
                    file.issues.push(e.to_string());
                }
            }
        }
        Ok(())
    }

    fn xmp_reference(file: &MediaFile) -> Option<DateTime<FixedOffset>> {
        file.tag(TagId::XmpCreateDate).and_then(TagValue::as_aware)
    }

    fn infer_exif_offset(&self, file: &mut MediaFile) {
        if file.tag(TagId::ExifTimeZoneOffset).is_some() {
            return;
        }
        let Some(naive) = file.tag(TagId::ExifDateTimeOriginal).and_then(TagValue::as_naive) else {
            return;
        };
        let offset = infer_offset(naive, Self::xmp_reference(file));
        let hours = i64::from(offset.local_minus_utc() / 3600);
        debug!(path = %file.path.display(), hours, "Inferred EXIF offset");
        file.tags.insert(TagId::ExifTimeZoneOffset, TagValue::Hours(hours));
    }

    fn fallback(
        &self,
        file: &mut MediaFile,
        avchd: &[MplDirectoryIndex],
    ) -> Result<Option<(DateTime<FixedOffset>, TimestampSource)>> {
        if is_clip_file(&file.path) {
            if let Some(index) = avchd.iter().find(|index| index.contains_path(&file.path)) {
                if let Some(ts) = self.avchd_timestamp(file, index) {
                    return Ok(Some((ts, TimestampSource::Avchd)));
                }
            }
        }

        self.read_probe(file)?;
        Ok(file
            .resolve_offset_aware(TagId::QuickTimeCreateDate, self.local_offset)
            .map(|ts| (ts, TimestampSource::QuickTime)))
    }

    fn avchd_timestamp(
        &self,
        file: &mut MediaFile,
        index: &MplDirectoryIndex,
    ) -> Option<DateTime<FixedOffset>> {
        let record = index
            .clip_for_path(&file.path)
            .and_then(|clip| index.get(clip));
        let Some(record) = record else {
            warn!(path = %file.path.display(), "Clip not found in any playlist");
            file.issues.push("clip not found in any playlist".to_string());
            return None;
        };

        let ts = match record.timestamp() {
            ClipTimestamp::Aware(ts) => Some(ts),
            ClipTimestamp::Naive(naive) => {
                let offset = infer_offset(naive, Self::xmp_reference(file));
                naive.and_local_timezone(offset).single()
            }
        }?;
        file.tags.insert(TagId::AvchdTimestamp, TagValue::Aware(ts));
        Some(ts)
    }

    fn read_probe(&self, file: &mut MediaFile) -> Result<()> {
        let tags: Vec<TagId> = TagId::probe_tags().collect();
        let values = match self.probe.probe(&file.path, &tags) {
            Ok(values) => values,
            Err(e @ (retimer_tags::Error::ToolNotFound { .. } | retimer_tags::Error::Io(_))) => {
                return Err(Error::Tags(e));
            }
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "Probe failed");
                file.issues.push(e.to_string());
                return Ok(());
            }
        };

        for (tag, raw) in values {
            match TagValue::parse(tag, &raw) {
                Ok(value) => {
                    file.tags.insert(tag, value);
                }
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Skipping probed tag");
                    file.issues.push(e.to_string());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retimer_common::time::parse_offset;
    use retimer_tags::MemoryBackend;
    use std::path::Path;

    fn naive(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn aware(text: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(text).unwrap()
    }

    fn reload(backend: &MemoryBackend, path: &Path) -> MediaFile {
        let reconciler = TagReconciler::new(backend, backend, parse_offset("+03:00").unwrap());
        let mut file = MediaFile::new(path, "f");
        reconciler.reload(&mut file, &[], TimeDelta::zero()).unwrap();
        file
    }

    fn scratch_file(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"data").unwrap();
        path
    }

    #[test]
    fn test_infer_offset() {
        let exif = naive("2020-06-01 10:00:00");
        assert_eq!(
            infer_offset(exif, Some(aware("2020-06-01T09:00:00+00:00"))).local_minus_utc(),
            3600
        );
        assert_eq!(infer_offset(exif, None).local_minus_utc(), 0);
        assert_eq!(
            infer_offset(exif, Some(aware("2020-06-01T12:10:00+00:00"))).local_minus_utc(),
            -2 * 3600
        );
        // 2.5 h rounds to even
        assert_eq!(
            infer_offset(exif, Some(aware("2020-06-01T07:30:00+00:00"))).local_minus_utc(),
            2 * 3600
        );
    }

    #[test]
    fn test_exif_with_offset_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_file(&dir, "a.jpg");
        let backend = MemoryBackend::new();
        backend.insert(&path, TagId::ExifDateTimeOriginal, "2020:06:01 10:00:00");
        backend.insert(&path, TagId::ExifTimeZoneOffset, "2");
        backend.insert(&path, TagId::XmpCreateDate, "2019-01-01T00:00:00+00:00");
        backend.insert(&path, TagId::QuickTimeCreateDate, "2018:01:01 00:00:00");

        let file = reload(&backend, &path);
        assert_eq!(file.source, Some(TimestampSource::ExifOriginal));
        assert_eq!(file.timestamp, Some(aware("2020-06-01T10:00:00+02:00")));
        assert_eq!(file.tag(TagId::QuickTimeCreateDate), None);
    }

    #[test]
    fn test_exif_offset_inferred_from_xmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_file(&dir, "a.jpg");
        let backend = MemoryBackend::new();
        backend.insert(&path, TagId::ExifDateTimeOriginal, "2020:06:01 10:00:00");
        backend.insert(&path, TagId::XmpCreateDate, "2020-06-01T09:00:00+00:00");

        let file = reload(&backend, &path);
        assert_eq!(file.tag(TagId::ExifTimeZoneOffset), Some(&TagValue::Hours(1)));
        let ts = file.timestamp.unwrap();
        assert_eq!(ts, aware("2020-06-01T10:00:00+01:00"));
        assert_eq!(ts.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn test_quicktime_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_file(&dir, "a.mov");
        let backend = MemoryBackend::new();
        backend.insert(&path, TagId::QuickTimeCreateDate, "2021:06:01 08:00:00");
        backend.insert(&path, TagId::NikonTimeZone, "+02:00");

        let file = reload(&backend, &path);
        assert_eq!(file.source, Some(TimestampSource::QuickTime));
        assert_eq!(file.timestamp, Some(aware("2021-06-01T08:00:00Z")));
        assert_eq!(
            file.tag(TagId::NikonTimeZone),
            Some(&TagValue::Text("+02:00".into()))
        );
    }

    #[test]
    fn test_mtime_fallback_and_parse_issue() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_file(&dir, "a.jpg");
        let backend = MemoryBackend::new();
        backend.insert(&path, TagId::ExifDateTimeOriginal, "garbage");
        backend.insert(&path, TagId::XmpCreateDate, "2020-06-01T09:00:00");

        let file = reload(&backend, &path);
        assert_eq!(file.source, Some(TimestampSource::FileModified));
        assert_eq!(file.timestamp, file.mtime);
        assert_eq!(file.timestamp.unwrap().offset().local_minus_utc(), 3 * 3600);
        assert_eq!(file.issues.len(), 1);
        assert_eq!(
            file.tag(TagId::XmpCreateDate),
            Some(&TagValue::Aware(aware("2020-06-01T09:00:00+00:00")))
        );
    }

    #[test]
    fn test_unsupported_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = scratch_file(&dir, "a.avi");
        let backend = MemoryBackend::new();
        backend.mark_unsupported(&path);
        backend.insert(&path, TagId::QuickTimeCreateDate, "2021:06:01 08:00:00");

        let file = reload(&backend, &path);
        assert_eq!(file.source, Some(TimestampSource::QuickTime));
        assert!(file.issues.is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let backend = MemoryBackend::new();
        let reconciler = TagReconciler::new(&backend, &backend, utc());
        let mut file = MediaFile::new("/nonexistent/retimer/a.jpg", "a.jpg");
        let err = reconciler
            .reload(&mut file, &[], TimeDelta::zero())
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
