//! AVCHD playlist (`*.MPL`) clip timestamp codec.
//!
//! A playlist ends with one fixed-width descriptor per clip. The descriptors
//! are located from the end of the file, so anything the camcorder stores in
//! front of them is never interpreted.
//!
//! ```text
//! offset 0       "MPLS0100"
//! offset 65      descriptor count N (1 byte)
//! len-84-66*N    N descriptors of 66 bytes each:
//!                  36 bytes   (opaque)
//!                   8 bytes   marker 01 03 05 01 00 00 00 02
//!                   2 bytes   clip id, big-endian       <- rewrite anchor
//!                   1 byte    0x1E
//!                   2 bytes   year, packed decimal
//!                   5 bytes   month day hour minute second, packed decimal
//!                   2 bytes   kind marker (90 0A or 90 0C)
//!                  10 bytes   ASCII "YYYY.MM.DD", space padded
//! len-84         84 trailing bytes (opaque)
//! ```

pub mod packed;
mod reader;
mod writer;

pub use reader::MplReader;

use crate::sidecar::TimezoneSidecar;
use crate::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Playlist file signature.
pub const SIGNATURE: &[u8; 8] = b"MPLS0100";

/// Offset of the descriptor count byte.
pub const COUNT_OFFSET: u64 = 65;

/// Width of one clip descriptor.
pub const DESCRIPTOR_LEN: u64 = 66;

/// Bytes between the last descriptor and the end of the file.
pub const TRAILER_LEN: u64 = 84;

/// Opaque bytes at the start of each descriptor.
pub(crate) const DESCRIPTOR_PREFIX_LEN: usize = 36;

/// Marker preceding the clip id in every descriptor.
pub(crate) const TIMESTAMP_MARKER: [u8; 8] = [0x01, 0x03, 0x05, 0x01, 0x00, 0x00, 0x00, 0x02];

/// Separator between the clip id and the packed timestamp.
pub(crate) const SEPARATOR: u8 = 0x1E;

/// Bytes from the rewrite anchor to the end of the descriptor.
pub(crate) const RECORD_LEN: usize = 22;

// Field positions relative to the rewrite anchor.
pub(crate) const ID_AT: usize = 0;
pub(crate) const SEPARATOR_AT: usize = 2;
pub(crate) const YEAR_AT: usize = 3;
pub(crate) const FIELDS_AT: usize = 5;
pub(crate) const KIND_AT: usize = 10;
pub(crate) const LABEL_AT: usize = 12;
pub(crate) const LABEL_LEN: usize = 10;

/// Numeric clip id, rendered as the clip's stream file name (`00127.MTS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClipId(pub u16);

impl ClipId {
    /// Parse a clip stream file name such as `00127.MTS` (extension case-insensitive).
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (stem, ext) = name.rsplit_once('.')?;
        if !ext.eq_ignore_ascii_case("MTS") || stem.is_empty() {
            return None;
        }
        if !stem.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        stem.parse().ok().map(Self)
    }

    /// Clip id for a media path, from its final component.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(Self::from_file_name)
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}.MTS", self.0)
    }
}

/// Two-byte descriptor kind marker. Kept as read, never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipKind([u8; 2]);

impl ClipKind {
    const RECOGNIZED: [[u8; 2]; 2] = [[0x90, 0x0A], [0x90, 0x0C]];

    /// Accept one of the two known marker values.
    pub fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        Self::RECOGNIZED.contains(&bytes).then_some(Self(bytes))
    }

    /// Raw marker bytes.
    pub fn bytes(&self) -> [u8; 2] {
        self.0
    }
}

impl fmt::Display for ClipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}", self.0[0], self.0[1])
    }
}

/// A clip timestamp: naive as stored in the playlist, or aware once a
/// sidecar offset is attached.
#[derive(Debug, Clone, Copy)]
pub enum ClipTimestamp {
    Naive(NaiveDateTime),
    Aware(DateTime<FixedOffset>),
}

impl ClipTimestamp {
    /// Build from a wall-clock value and an optional offset.
    pub fn new(local: NaiveDateTime, offset: Option<FixedOffset>) -> Self {
        match offset.and_then(|o| local.and_local_timezone(o).single()) {
            Some(ts) => Self::Aware(ts),
            None => Self::Naive(local),
        }
    }

    /// Wall-clock value as stored in the playlist.
    pub fn local(&self) -> NaiveDateTime {
        match self {
            Self::Naive(ts) => *ts,
            Self::Aware(ts) => ts.naive_local(),
        }
    }

    /// Attached UTC offset, if any.
    pub fn offset(&self) -> Option<FixedOffset> {
        match self {
            Self::Naive(_) => None,
            Self::Aware(ts) => Some(*ts.offset()),
        }
    }

    pub fn is_aware(&self) -> bool {
        matches!(self, Self::Aware(_))
    }
}

// Two aware values at the same instant but different offsets are stored
// differently, so equality is on the stored representation.
impl PartialEq for ClipTimestamp {
    fn eq(&self, other: &Self) -> bool {
        self.local() == other.local() && self.offset() == other.offset()
    }
}

impl Eq for ClipTimestamp {}

impl fmt::Display for ClipTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Naive(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            Self::Aware(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%:z")),
        }
    }
}

impl From<NaiveDateTime> for ClipTimestamp {
    fn from(ts: NaiveDateTime) -> Self {
        Self::Naive(ts)
    }
}

impl From<DateTime<FixedOffset>> for ClipTimestamp {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        Self::Aware(ts)
    }
}

/// One clip's timestamp record inside a playlist.
#[derive(Debug, Clone)]
pub struct MtsClipRecord {
    id: ClipId,
    anchor: u64,
    kind: ClipKind,
    timestamp: ClipTimestamp,
    dirty: bool,
}

impl MtsClipRecord {
    pub(crate) fn new(id: ClipId, anchor: u64, kind: ClipKind, timestamp: ClipTimestamp) -> Self {
        Self {
            id,
            anchor,
            kind,
            timestamp,
            dirty: false,
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    /// Absolute file offset of the clip id field.
    pub fn anchor(&self) -> u64 {
        self.anchor
    }

    pub fn kind(&self) -> ClipKind {
        self.kind
    }

    pub fn timestamp(&self) -> ClipTimestamp {
        self.timestamp
    }

    /// Whether the record has unwritten changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the timestamp. Marks the record dirty if the stored
    /// representation changes; returns whether it did.
    pub fn set_timestamp(&mut self, timestamp: impl Into<ClipTimestamp>) -> bool {
        let timestamp = timestamp.into();
        if timestamp == self.timestamp {
            return false;
        }
        self.timestamp = timestamp;
        self.dirty = true;
        true
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

/// A decoded playlist file.
#[derive(Debug)]
pub struct MplFile {
    path: PathBuf,
    recorded_len: u64,
    records: BTreeMap<ClipId, MtsClipRecord>,
    sidecar: TimezoneSidecar,
}

impl MplFile {
    /// Decode a playlist and its timezone sidecar.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let sidecar = TimezoneSidecar::load(path)?;
        let file = File::open(path)?;
        let mut reader = MplReader::new(file)?;
        let recorded_len = reader.file_size();
        let decoded = reader.read_records(&sidecar)?;

        let mut records = BTreeMap::new();
        for record in decoded {
            if records.insert(record.id(), record).is_some() {
                tracing::warn!(
                    playlist = %path.display(),
                    "Clip listed more than once, keeping the last descriptor"
                );
            }
        }

        tracing::debug!(
            playlist = %path.display(),
            clips = records.len(),
            "Decoded playlist"
        );

        Ok(Self {
            path: path.to_path_buf(),
            recorded_len,
            records,
            sidecar,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File length observed at decode time.
    pub fn recorded_len(&self) -> u64 {
        self.recorded_len
    }

    /// Records ordered by clip id.
    pub fn records(&self) -> impl Iterator<Item = &MtsClipRecord> {
        self.records.values()
    }

    pub fn clip_ids(&self) -> impl Iterator<Item = ClipId> + '_ {
        self.records.keys().copied()
    }

    pub fn get(&self, id: ClipId) -> Option<&MtsClipRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: ClipId) -> Option<&mut MtsClipRecord> {
        self.records.get_mut(&id)
    }

    pub fn sidecar(&self) -> &TimezoneSidecar {
        &self.sidecar
    }

    pub fn is_dirty(&self) -> bool {
        self.records.values().any(MtsClipRecord::is_dirty)
    }

    /// Write every dirty record back in place and persist the sidecar.
    ///
    /// Returns `Ok(false)` without touching the file when nothing is dirty.
    /// Dirty flags are cleared only once everything has been written.
    pub fn write(&mut self) -> Result<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let actual = file.metadata()?.len();
        if actual != self.recorded_len {
            return Err(Error::LayoutChanged {
                expected: self.recorded_len,
                actual,
            });
        }

        let dirty: Vec<&MtsClipRecord> = self.records.values().filter(|r| r.is_dirty()).collect();
        writer::write_records(&mut file, &dirty)?;
        file.sync_all()?;

        for record in &dirty {
            self.sidecar.set(record.id(), record.timestamp().offset());
        }
        self.sidecar.save()?;

        tracing::info!(
            playlist = %self.path.display(),
            records = dirty.len(),
            "Wrote playlist timestamps"
        );

        for record in self.records.values_mut() {
            record.mark_clean();
        }
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    //! Synthetic playlist bytes for tests.

    use super::*;
    use chrono::{Datelike, Timelike};

    pub const HEADER_LEN: usize = 96;

    pub fn descriptor(id: u16, ts: NaiveDateTime, kind: [u8; 2]) -> Vec<u8> {
        let mut out = vec![0xEEu8; DESCRIPTOR_PREFIX_LEN];
        out.extend_from_slice(&TIMESTAMP_MARKER);
        out.extend_from_slice(&id.to_be_bytes());
        out.push(SEPARATOR);
        out.extend_from_slice(&packed::encode::<2>(ts.year() as u32).unwrap());
        for field in [ts.month(), ts.day(), ts.hour(), ts.minute(), ts.second()] {
            out.extend_from_slice(&packed::encode::<1>(field).unwrap());
        }
        out.extend_from_slice(&kind);
        out.extend_from_slice(
            format!("{:4}.{:2}.{:2}", ts.year(), ts.month(), ts.day()).as_bytes(),
        );
        assert_eq!(out.len() as u64, DESCRIPTOR_LEN);
        out
    }

    pub fn playlist(clips: &[(u16, NaiveDateTime)]) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_LEN];
        out[..8].copy_from_slice(SIGNATURE);
        out[COUNT_OFFSET as usize] = clips.len() as u8;
        for (id, ts) in clips {
            out.extend(descriptor(*id, *ts, [0x90, 0x0A]));
        }
        out.extend(vec![0xAAu8; TRAILER_LEN as usize]);
        out
    }

    /// Absolute offset of clip `index`'s rewrite anchor in a [`playlist`].
    pub fn anchor_of(index: usize) -> usize {
        HEADER_LEN + index * DESCRIPTOR_LEN as usize + DESCRIPTOR_PREFIX_LEN + TIMESTAMP_MARKER.len()
    }

    pub fn ts(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
    }
}
