//! Directory-wide clip index.
//!
//! Loads every playlist under a root and answers clip lookups across all of
//! them. Clip ids are unique within one AVCHD directory.

use crate::error::FileError;
use crate::mpl::{ClipId, MplFile, MtsClipRecord};
use crate::{Error, Result};
use retimer_common::paths::is_playlist_file;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Outcome of loading an index.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Playlists decoded.
    pub loaded: usize,
    /// Clip records found across all playlists.
    pub clips: usize,
    /// `.MPL` files that turned out not to be playlists.
    pub skipped: Vec<PathBuf>,
    /// Playlists that failed to decode.
    pub failed: Vec<FileError>,
}

/// Every playlist below one AVCHD root, merged into one clip lookup.
#[derive(Debug)]
pub struct MplDirectoryIndex {
    root: PathBuf,
    files: Vec<MplFile>,
    clips: HashMap<ClipId, usize>,
}

impl MplDirectoryIndex {
    /// Create an empty index for a root. Call [`read`](Self::read) to load it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Vec::new(),
            clips: HashMap::new(),
        }
    }

    /// Create and load an index.
    pub fn open(root: impl Into<PathBuf>) -> Result<(Self, LoadReport)> {
        let mut index = Self::new(root);
        let report = index.read()?;
        Ok((index, report))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// (Re)load every playlist under the root, discarding unwritten changes.
    ///
    /// Individual playlists that fail to decode are reported in the
    /// [`LoadReport`]; only an unreadable root is an error.
    pub fn read(&mut self) -> Result<LoadReport> {
        if !self.root.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("AVCHD directory not found: {}", self.root.display()),
            )));
        }

        self.files.clear();
        self.clips.clear();
        let mut report = LoadReport::default();

        let entries = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok());

        for entry in entries {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_playlist_file(path) {
                continue;
            }

            match MplFile::open(path) {
                Ok(file) => {
                    let slot = self.files.len();
                    for id in file.clip_ids() {
                        let previous = self.clips.insert(id, slot);
                        debug_assert!(previous.is_none(), "clip {id} listed by two playlists");
                    }
                    report.clips += file.records().count();
                    report.loaded += 1;
                    self.files.push(file);
                }
                Err(e) if e.is_format() => {
                    debug!(path = %path.display(), error = %e, "Skipping non-playlist file");
                    report.skipped.push(path.to_path_buf());
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to decode playlist");
                    report.failed.push(FileError {
                        path: path.to_path_buf(),
                        error: e,
                    });
                }
            }
        }

        info!(
            root = %self.root.display(),
            playlists = report.loaded,
            clips = report.clips,
            failed = report.failed.len(),
            "Loaded AVCHD index"
        );
        Ok(report)
    }

    pub fn files(&self) -> &[MplFile] {
        &self.files
    }

    /// All clip records, ordered by clip id.
    pub fn clips(&self) -> Vec<&MtsClipRecord> {
        let mut records: Vec<&MtsClipRecord> =
            self.files.iter().flat_map(MplFile::records).collect();
        records.sort_by_key(|r| r.id());
        records
    }

    pub fn get(&self, clip: ClipId) -> Option<&MtsClipRecord> {
        let slot = *self.clips.get(&clip)?;
        self.files.get(slot)?.get(clip)
    }

    pub fn get_mut(&mut self, clip: ClipId) -> Option<&mut MtsClipRecord> {
        let slot = *self.clips.get(&clip)?;
        self.files.get_mut(slot)?.get_mut(clip)
    }

    /// Whether a media path lies under this index's root.
    pub fn contains_path(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    /// Clip id of a `.MTS` media path under this root.
    pub fn clip_for_path(&self, path: &Path) -> Option<ClipId> {
        if !self.contains_path(path) {
            return None;
        }
        ClipId::from_path(path)
    }

    pub fn is_dirty(&self) -> bool {
        self.files.iter().any(MplFile::is_dirty)
    }

    /// Flush the playlist owning one clip, if it has pending changes.
    pub fn write_clip(&mut self, clip: ClipId) -> Result<bool> {
        match self.clips.get(&clip).copied() {
            Some(slot) => match self.files.get_mut(slot) {
                Some(file) => file.write(),
                None => Ok(false),
            },
            None => Ok(false),
        }
    }

    /// Flush every playlist with pending changes.
    ///
    /// Every dirty playlist is attempted; failures are returned together as
    /// [`Error::Flush`]. Returns the number of playlists written.
    pub fn write(&mut self) -> Result<usize> {
        let mut written = 0;
        let mut failures = Vec::new();

        for file in &mut self.files {
            match file.write() {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(path = %file.path().display(), error = %e, "Failed to write playlist");
                    failures.push(FileError {
                        path: file.path().to_path_buf(),
                        error: e,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(written)
        } else {
            Err(Error::Flush(failures))
        }
    }
}
