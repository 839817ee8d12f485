//! Retimer-AVCHD: clip timestamps stored in AVCHD playlist files
//!
//! AVCHD camcorders keep the capture time of every clip in the `*.MPL`
//! playlist files under `AVCHD/BDMV/PLAYLIST`, not in the `*.MTS` streams
//! themselves. This crate reads and rewrites those timestamps in place.
//!
//! # Modules
//!
//! - `mpl` - Playlist codec (descriptor layout, packed-decimal fields, in-place rewrite)
//! - `sidecar` - JSON sidecar holding the UTC offset of each clip
//! - `index` - Directory-wide clip lookup across every playlist under a root
//!
//! # Architecture
//!
//! Playlist timestamps are timezone-naive. When a clip's timestamp has been
//! given an offset, the offset is stored next to the playlist in
//! `<name>.MPL.timezone.json` and re-attached on the next decode.
//!
//! A rewrite only touches the byte offsets recorded during the last decode,
//! and is refused outright if the playlist's length changed in between.

pub mod error;
pub mod index;
pub mod mpl;
pub mod sidecar;

pub use error::{Error, FileError, Result};
pub use index::{LoadReport, MplDirectoryIndex};
pub use mpl::{ClipId, ClipKind, ClipTimestamp, MplFile, MtsClipRecord};
pub use sidecar::TimezoneSidecar;
