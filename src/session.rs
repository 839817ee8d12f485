//! The explicit reconciliation context.
//!
//! A [`Session`] owns the loaded files, the AVCHD indexes, the anchor set and
//! the timezone settings. Edits (lock, unlock, delta changes) mark per-file
//! deltas stale; the batch passes in [`crate::batch`] bring them up to date,
//! reload evidence and write corrections back.

use crate::batch::{FileFailure, Pass, PassKind};
use crate::interpolate::DeltaInterpolator;
use crate::media::MediaFile;
use crate::reconcile::TagReconciler;
use crate::scanner::{display_paths, Scan};
use crate::writeback::WriteBackEngine;
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, Offset, TimeDelta};
use retimer_avchd::MplDirectoryIndex;
use retimer_common::time::local_offset;
use retimer_tags::{TagProbe, TagStoreProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Session {
    store: Arc<dyn TagStoreProvider>,
    probe: Arc<dyn TagProbe>,
    files: Vec<MediaFile>,
    avchd: Vec<MplDirectoryIndex>,
    interpolator: DeltaInterpolator,
    target_offset: FixedOffset,
    local_offset: FixedOffset,
    stale: bool,
}

impl Session {
    /// Empty session using the running environment's offset for both the
    /// local and the target timezone.
    pub fn new(store: Arc<dyn TagStoreProvider>, probe: Arc<dyn TagProbe>) -> Self {
        let local = local_offset();
        Self {
            store,
            probe,
            files: Vec::new(),
            avchd: Vec::new(),
            interpolator: DeltaInterpolator::new(),
            target_offset: local,
            local_offset: local,
            stale: false,
        }
    }

    /// Replace the file set with a scan result.
    pub fn populate(&mut self, scan: Scan) {
        self.files = scan
            .files
            .into_iter()
            .map(|f| MediaFile::new(f.path, f.display_path))
            .collect();
        self.avchd = scan
            .avchd_roots
            .into_iter()
            .map(MplDirectoryIndex::new)
            .collect();
        self.stale = true;
    }

    /// Add files, recomputing display paths over the whole set.
    pub fn add_files(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        let mut all: Vec<PathBuf> = self.files.drain(..).map(|f| f.path).collect();
        all.extend(paths);
        all.sort();
        all.dedup();
        let display = display_paths(&all);
        self.files = all
            .into_iter()
            .zip(display)
            .map(|(path, display_path)| MediaFile::new(path, display_path))
            .collect();
        self.stale = true;
    }

    /// Register an AVCHD root; it is read on the next reload.
    pub fn add_avchd_root(&mut self, root: impl Into<PathBuf>) {
        let root = root.into();
        if !self.avchd.iter().any(|index| index.root() == root) {
            self.avchd.push(MplDirectoryIndex::new(root));
        }
    }

    pub fn files(&self) -> &[MediaFile] {
        &self.files
    }

    pub fn file(&self, path: &Path) -> Option<&MediaFile> {
        self.position(path).map(|i| &self.files[i])
    }

    fn position(&self, path: &Path) -> Option<usize> {
        self.files.iter().position(|f| f.path == path)
    }

    fn require(&self, path: &Path) -> Result<usize> {
        self.position(path)
            .ok_or_else(|| Error::UnknownFile(path.to_path_buf()))
    }

    pub fn avchd_indexes(&self) -> &[MplDirectoryIndex] {
        &self.avchd
    }

    pub fn interpolator(&self) -> &DeltaInterpolator {
        &self.interpolator
    }

    pub fn target_offset(&self) -> FixedOffset {
        self.target_offset
    }

    pub fn set_target_offset(&mut self, offset: FixedOffset) {
        self.target_offset = offset;
    }

    pub fn local_offset(&self) -> FixedOffset {
        self.local_offset
    }

    /// Offset used for naive local values (mtime, IPTC).
    pub fn set_local_offset(&mut self, offset: FixedOffset) {
        self.local_offset = offset;
    }

    pub fn default_delta(&self) -> TimeDelta {
        self.interpolator.default_delta()
    }

    /// Change the correction applied when no anchor exists.
    pub fn set_default_delta(&mut self, delta: TimeDelta) {
        self.interpolator.set_default(delta);
        self.stale = true;
    }

    /// Whether per-file deltas lag behind the anchor set.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    fn canonical(&self, index: usize) -> Result<DateTime<FixedOffset>> {
        let file = &self.files[index];
        file.timestamp
            .ok_or_else(|| Error::NoTimestamp(file.path.clone()))
    }

    /// Pin the file's current delta at its canonical timestamp.
    pub fn lock(&mut self, path: &Path) -> Result<()> {
        let index = self.require(path)?;
        let ts = self.canonical(index)?;
        let file = &mut self.files[index];
        self.interpolator.lock(ts, file.delta);
        file.locked = true;
        self.stale = true;
        debug!(path = %path.display(), %ts, "Locked");
        Ok(())
    }

    /// Remove the file's anchor and re-derive its delta from the rest.
    pub fn unlock(&mut self, path: &Path) -> Result<()> {
        let index = self.require(path)?;
        let ts = self.canonical(index)?;
        self.interpolator.unlock(ts);
        let delta = self.interpolator.effective_delta(ts);
        self.interpolator.set_default(delta);
        let file = &mut self.files[index];
        file.locked = false;
        file.delta = delta;
        self.stale = true;
        debug!(path = %path.display(), %ts, "Unlocked");
        Ok(())
    }

    /// Set a file's delta, which also becomes the default.
    ///
    /// Once any anchor exists, an edited file is locked with its new delta.
    pub fn set_delta(&mut self, path: &Path, delta: TimeDelta) -> Result<()> {
        let index = self.require(path)?;
        self.files[index].delta = delta;
        self.interpolator.set_default(delta);
        self.stale = true;
        if !self.interpolator.is_empty() || self.files[index].locked {
            self.lock(path)?;
        }
        Ok(())
    }

    /// Declare the true capture time of a file.
    ///
    /// The delta becomes `ts - canonical` and the target timezone becomes
    /// `ts`'s offset.
    pub fn set_corrected_timestamp(&mut self, path: &Path, ts: DateTime<FixedOffset>) -> Result<()> {
        let index = self.require(path)?;
        let delta = ts - self.canonical(index)?;
        self.target_offset = ts.offset().fix();
        self.set_delta(path, delta)
    }

    /// Clear every anchor and zero the default.
    pub fn reset_deltas(&mut self) {
        self.interpolator.clear();
        self.stale = true;
    }

    fn all_files(&self) -> Vec<usize> {
        (0..self.files.len()).collect()
    }

    fn select(&self, paths: &[PathBuf]) -> (Vec<usize>, Vec<FileFailure>) {
        let mut targets = Vec::new();
        let mut failures = Vec::new();
        for path in paths {
            match self.position(path) {
                Some(index) => targets.push(index),
                None => failures.push(FileFailure::new(path, Error::UnknownFile(path.clone()))),
            }
        }
        targets.sort_unstable();
        targets.dedup();
        (targets, failures)
    }

    /// Assign every file its interpolated delta.
    pub fn recompute(&mut self) -> Pass<'_> {
        let targets = self.all_files();
        Pass::new(self, PassKind::Recompute, targets, Vec::new())
    }

    /// Reset deltas, re-read the AVCHD indexes and reconcile every file.
    pub fn reload(&mut self) -> Pass<'_> {
        let targets = self.all_files();
        Pass::new(self, PassKind::Reload, targets, Vec::new())
    }

    /// As [`Session::reload`], for some files only.
    pub fn reload_only(&mut self, paths: &[PathBuf]) -> Pass<'_> {
        let (targets, failures) = self.select(paths);
        Pass::new(self, PassKind::Reload, targets, failures)
    }

    /// Write every file's correction, finishing a stale recompute first.
    pub fn write_back(&mut self) -> Pass<'_> {
        let targets = self.all_files();
        Pass::new(self, PassKind::WriteBack, targets, Vec::new())
    }

    /// As [`Session::write_back`], for some files only.
    pub fn write_back_only(&mut self, paths: &[PathBuf]) -> Pass<'_> {
        let (targets, failures) = self.select(paths);
        Pass::new(self, PassKind::WriteBack, targets, failures)
    }

    fn recompute_file(&mut self, index: usize) {
        let interpolator = &self.interpolator;
        let file = &mut self.files[index];
        match file.timestamp {
            Some(ts) => {
                file.delta = interpolator.effective_delta(ts);
                file.locked = interpolator.is_locked(ts);
            }
            None => {
                file.delta = interpolator.default_delta();
                file.locked = false;
            }
        }
    }

    pub(crate) fn begin_pass(&mut self, kind: PassKind, failures: &mut Vec<FileFailure>) {
        debug!(%kind, files = self.files.len(), "Starting pass");
        match kind {
            PassKind::Reload => {
                self.reset_deltas();
                for index in &mut self.avchd {
                    match index.read() {
                        Ok(report) => failures.extend(
                            report
                                .failed
                                .into_iter()
                                .map(|f| FileFailure::new(f.path, f.error)),
                        ),
                        Err(e) => failures.push(FileFailure::new(index.root(), e)),
                    }
                }
            }
            PassKind::Recompute => {}
            PassKind::WriteBack => {
                if self.stale {
                    for index in 0..self.files.len() {
                        self.recompute_file(index);
                    }
                    self.stale = false;
                }
            }
        }
    }

    pub(crate) fn process(&mut self, kind: PassKind, index: usize, failures: &mut Vec<FileFailure>) {
        if kind == PassKind::Recompute {
            self.recompute_file(index);
            return;
        }
        let default_delta = self.interpolator.default_delta();
        let Self {
            store,
            probe,
            files,
            avchd,
            local_offset,
            target_offset,
            ..
        } = self;
        let file = &mut files[index];

        match kind {
            PassKind::Reload => {
                let reconciler = TagReconciler::new(&**store, &**probe, *local_offset);
                if let Err(e) = reconciler.reload(file, avchd, default_delta) {
                    warn!(path = %file.path.display(), error = %e, "Failed to reload");
                    failures.push(FileFailure::new(&file.path, e));
                }
            }
            PassKind::Recompute => {}
            PassKind::WriteBack => {
                let engine = WriteBackEngine::new(
                    &**store,
                    &**probe,
                    *local_offset,
                    *target_offset,
                );
                match engine.write(file, avchd) {
                    Ok(outcome) => failures.extend(
                        outcome
                            .failures
                            .into_iter()
                            .map(|message| FileFailure::new(&file.path, message)),
                    ),
                    Err(e) => {
                        warn!(path = %file.path.display(), error = %e, "Failed to write");
                        failures.push(FileFailure::new(&file.path, e));
                    }
                }
            }
        }
    }

    pub(crate) fn end_pass(&mut self, kind: PassKind, failures: &mut Vec<FileFailure>) {
        match kind {
            PassKind::Reload => {}
            PassKind::Recompute => self.stale = false,
            PassKind::WriteBack => {
                for index in &mut self.avchd {
                    if let Err(retimer_avchd::Error::Flush(errors)) = index.write() {
                        failures.extend(errors.into_iter().map(|f| FileFailure::new(f.path, f.error)));
                    }
                }
            }
        }
        info!(%kind, files = self.files.len(), failures = failures.len(), "Pass complete");
    }
}
