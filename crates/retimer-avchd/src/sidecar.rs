//! Timezone sidecar for playlist clips.
//!
//! Playlists store wall-clock time only. The UTC offset of each clip whose
//! timezone is known lives in `<playlist>.timezone.json`, a JSON object
//! mapping the clip file name to its offset in seconds:
//!
//! ```json
//! {"00127.MTS": 3600}
//! ```

use crate::mpl::ClipId;
use crate::{Error, Result};
use chrono::FixedOffset;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Suffix appended to the playlist path.
pub const SIDECAR_SUFFIX: &str = ".timezone.json";

/// Clip offsets stored next to a playlist.
#[derive(Debug, Clone, Default)]
pub struct TimezoneSidecar {
    path: PathBuf,
    offsets: BTreeMap<String, i64>,
}

impl TimezoneSidecar {
    /// Sidecar path for a playlist.
    pub fn path_for(playlist: &Path) -> PathBuf {
        let mut name = playlist.as_os_str().to_owned();
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    /// Load the sidecar for a playlist. A missing sidecar is empty.
    pub fn load(playlist: &Path) -> Result<Self> {
        let path = Self::path_for(playlist);
        let offsets = match fs::read_to_string(&path) {
            Ok(text) => {
                // Older sidecars hold float seconds.
                let raw: BTreeMap<String, f64> = serde_json::from_str(&text)?;
                raw.into_iter()
                    .map(|(clip, secs)| (clip, secs.round() as i64))
                    .collect()
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::Io(e)),
        };
        Ok(Self { path, offsets })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Offset recorded for a clip.
    pub fn offset(&self, clip: ClipId) -> Option<FixedOffset> {
        let secs = *self.offsets.get(&clip.to_string())?;
        let offset = i32::try_from(secs).ok().and_then(FixedOffset::east_opt);
        if offset.is_none() {
            tracing::warn!(
                sidecar = %self.path.display(),
                clip = %clip,
                secs,
                "Ignoring out-of-range clip offset"
            );
        }
        offset
    }

    /// Record or clear a clip's offset.
    pub fn set(&mut self, clip: ClipId, offset: Option<FixedOffset>) {
        match offset {
            Some(offset) => {
                self.offsets
                    .insert(clip.to_string(), i64::from(offset.local_minus_utc()));
            }
            None => {
                self.offsets.remove(&clip.to_string());
            }
        }
    }

    /// Persist the sidecar atomically.
    ///
    /// Nothing is created when there is nothing to store and no sidecar
    /// exists yet.
    pub fn save(&self) -> Result<()> {
        if self.offsets.is_empty() && !self.path.exists() {
            return Ok(());
        }
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &self.offsets)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}
