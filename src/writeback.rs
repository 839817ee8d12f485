//! Propagate a corrected timestamp to every namespace of a file.
//!
//! Every populated timestamp tag is moved into the target timezone, shifted
//! by the file's delta and rounded to a whole second, then written back in
//! its native layout. Unchanged values are left alone. Namespaces fail
//! independently: a failure is recorded and the remaining namespaces are
//! still attempted.

use crate::media::MediaFile;
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone, Utc};
use retimer_avchd::MplDirectoryIndex;
use retimer_common::time::{round_to_second, round_to_whole_hour, utc, whole_hours};
use retimer_tags::{Namespace, TagId, TagProbe, TagStoreProvider, TagValue, ValueKind};
use std::fs::{File, FileTimes};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

/// What a write-back changed for one file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Store and probe tags rewritten.
    pub tags_written: usize,
    /// Whether the owning playlist was flushed.
    pub avchd_written: bool,
    pub mtime_updated: bool,
    /// Per-namespace failures.
    pub failures: Vec<String>,
}

impl WriteOutcome {
    pub fn changed(&self) -> bool {
        self.tags_written > 0 || self.avchd_written || self.mtime_updated
    }
}

/// Set access and modification time of a file.
pub fn set_file_times(path: &Path, ts: DateTime<FixedOffset>) -> std::io::Result<()> {
    let time = SystemTime::from(ts.with_timezone(&Utc));
    let file = File::options().write(true).open(path)?;
    file.set_times(FileTimes::new().set_accessed(time).set_modified(time))
}

/// Applies corrections through the tag collaborators and AVCHD indexes.
pub struct WriteBackEngine<'a> {
    store: &'a dyn TagStoreProvider,
    probe: &'a dyn TagProbe,
    local_offset: FixedOffset,
    target: FixedOffset,
}

impl<'a> WriteBackEngine<'a> {
    /// `target` is rounded to whole hours.
    pub fn new(
        store: &'a dyn TagStoreProvider,
        probe: &'a dyn TagProbe,
        local_offset: FixedOffset,
        target: FixedOffset,
    ) -> Self {
        Self {
            store,
            probe,
            local_offset,
            target: round_to_whole_hour(target),
        }
    }

    pub fn target(&self) -> FixedOffset {
        self.target
    }

    fn shift(&self, ts: DateTime<FixedOffset>, delta: TimeDelta) -> DateTime<FixedOffset> {
        round_to_second(ts.with_timezone(&self.target) + delta)
    }

    /// New native values for the store-backed tags that change.
    fn store_updates(&self, file: &MediaFile) -> Vec<(TagId, TagValue)> {
        let mut updates = Vec::new();
        for (tag, value) in &file.tags {
            if !matches!(tag.namespace(), Namespace::Exif | Namespace::Xmp | Namespace::Iptc) {
                continue;
            }
            match tag.kind() {
                ValueKind::ExifDateTime => {
                    if let Some(ts) = file.resolve_offset_aware(*tag, self.local_offset) {
                        let new = self.shift(ts, file.delta).naive_local();
                        updates.push((*tag, TagValue::Naive(new)));
                    }
                }
                ValueKind::XmpDateTime => {
                    if let Some(ts) = value.as_aware() {
                        updates.push((*tag, TagValue::Aware(self.shift(ts, file.delta))));
                    }
                }
                ValueKind::IptcDate => {
                    let (Some(ts), Some(partner)) = (
                        file.resolve_offset_aware(*tag, self.local_offset),
                        tag.time_partner(),
                    ) else {
                        continue;
                    };
                    let new = self.shift(ts, file.delta).naive_local();
                    updates.push((*tag, TagValue::Date(new.date())));
                    updates.push((partner, TagValue::Time(new.time())));
                }
                ValueKind::OffsetHours => {
                    updates.push((*tag, TagValue::Hours(whole_hours(self.target))));
                }
                _ => {}
            }
        }
        updates.retain(|(tag, value)| file.tag(*tag) != Some(value));
        updates
    }

    /// New UTC values for the QuickTime tags that change.
    fn probe_updates(&self, file: &MediaFile) -> Vec<(TagId, TagValue)> {
        file.namespace_tags(Namespace::QuickTime)
            .filter_map(|(tag, value)| {
                let ts = utc().from_local_datetime(&value.as_naive()?).single()?;
                let new = TagValue::Naive(self.shift(ts, file.delta).naive_utc());
                (Some(&new) != file.tag(tag)).then_some((tag, new))
            })
            .collect()
    }

    fn write_store(&self, file: &mut MediaFile, outcome: &mut WriteOutcome) {
        let updates = self.store_updates(file);
        if updates.is_empty() {
            return;
        }
        let result = self.store.open(&file.path).and_then(|mut store| {
            for (tag, value) in &updates {
                store.set(*tag, value.to_native());
            }
            store.write()
        });
        match result {
            Ok(()) => {
                outcome.tags_written += updates.len();
                file.tags.extend(updates);
            }
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "Failed to write metadata");
                outcome.failures.push(format!("metadata: {e}"));
            }
        }
    }

    fn write_probe(&self, file: &mut MediaFile, outcome: &mut WriteOutcome) {
        let updates = self.probe_updates(file);
        if updates.is_empty() {
            return;
        }
        let native: Vec<(TagId, String)> = updates
            .iter()
            .map(|(tag, value)| (*tag, value.to_native()))
            .collect();
        match self.probe.write(&file.path, &native) {
            Ok(()) => {
                outcome.tags_written += updates.len();
                file.tags.extend(updates);
            }
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "Failed to write QuickTime tags");
                outcome.failures.push(format!("quicktime: {e}"));
            }
        }
    }

    fn write_avchd(
        &self,
        file: &mut MediaFile,
        avchd: &mut [MplDirectoryIndex],
        outcome: &mut WriteOutcome,
    ) {
        let Some(ts) = file.tag(TagId::AvchdTimestamp).and_then(TagValue::as_aware) else {
            return;
        };
        let new = self.shift(ts, file.delta);
        if new == ts && new.offset() == ts.offset() {
            return;
        }
        let owner = avchd
            .iter_mut()
            .find_map(|index| index.clip_for_path(&file.path).map(|clip| (index, clip)));
        let Some((index, clip)) = owner else {
            outcome.failures.push("avchd: clip no longer indexed".to_string());
            return;
        };
        let Some(record) = index.get_mut(clip) else {
            outcome.failures.push(format!("avchd: {clip} not found"));
            return;
        };
        if !record.set_timestamp(new) {
            return;
        }
        match index.write_clip(clip) {
            Ok(written) => {
                outcome.avchd_written = written;
                file.tags.insert(TagId::AvchdTimestamp, TagValue::Aware(new));
            }
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "Failed to write playlist");
                outcome.failures.push(format!("avchd: {e}"));
            }
        }
    }

    fn write_mtime(&self, file: &mut MediaFile, ts_new: DateTime<FixedOffset>, outcome: &mut WriteOutcome) {
        if file.mtime == Some(ts_new) {
            return;
        }
        match set_file_times(&file.path, ts_new) {
            Ok(()) => {
                outcome.mtime_updated = true;
                file.mtime = Some(ts_new.with_timezone(&self.local_offset));
            }
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "Failed to set modification time");
                outcome.failures.push(format!("mtime: {e}"));
            }
        }
    }

    /// Write the correction for one file.
    ///
    /// Fails only when the file cannot be corrected at all: it has no
    /// canonical timestamp, or it was written since its last reload.
    pub fn write(&self, file: &mut MediaFile, avchd: &mut [MplDirectoryIndex]) -> Result<WriteOutcome> {
        if file.is_written() {
            return Err(Error::Stale(file.path.clone()));
        }
        let ts = file
            .timestamp
            .ok_or_else(|| Error::NoTimestamp(file.path.clone()))?;
        let ts_new = ts.with_timezone(&self.target) + file.delta;

        let mut outcome = WriteOutcome::default();
        self.write_store(file, &mut outcome);
        self.write_probe(file, &mut outcome);
        self.write_avchd(file, avchd, &mut outcome);
        self.write_mtime(file, ts_new, &mut outcome);

        file.issues.extend(outcome.failures.iter().cloned());
        if outcome.changed() {
            file.mark_written();
        }
        debug!(
            path = %file.path.display(),
            tags = outcome.tags_written,
            avchd = outcome.avchd_written,
            mtime = outcome.mtime_updated,
            failures = outcome.failures.len(),
            "Wrote corrected timestamp"
        );
        Ok(outcome)
    }
}
