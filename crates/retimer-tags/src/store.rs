//! Metadata store abstraction for EXIF/XMP/IPTC tags.

use crate::{Result, TagId};
use std::path::Path;

/// An open file's EXIF/XMP/IPTC tags.
///
/// Values are raw strings in the tag family's native layout; use
/// [`TagValue::parse`](crate::TagValue::parse) to interpret them. Changes made
/// with [`set`](Self::set) are held until [`write`](Self::write).
pub trait TagStore: Send {
    /// Path of the file this store was opened for.
    fn path(&self) -> &Path;

    /// Raw value of a tag, if present.
    fn get(&self, tag: TagId) -> Option<String>;

    /// Stage a new value for a tag.
    fn set(&mut self, tag: TagId, value: String);

    /// Persist staged values to the file. No-op when nothing is staged.
    fn write(&mut self) -> Result<()>;
}

/// Opens [`TagStore`]s for files.
pub trait TagStoreProvider: Send + Sync {
    /// Name of this backend.
    fn name(&self) -> &'static str;

    /// Open the tags of a file.
    ///
    /// Returns [`Error::Unsupported`](crate::Error::Unsupported) when the
    /// backend cannot handle the file's format.
    fn open(&self, path: &Path) -> Result<Box<dyn TagStore>>;
}
