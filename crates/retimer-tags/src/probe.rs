//! External probe abstraction for QuickTime and maker-note tags.

use crate::{Result, TagId};
use std::path::Path;

/// Reads and writes tags that the metadata store does not cover.
pub trait TagProbe: Send + Sync {
    /// Name of this probe.
    fn name(&self) -> &'static str;

    /// Fetch the requested tags as `(tag, raw value)` pairs, in the order the
    /// probe reports them. Tags absent from the file are omitted.
    fn probe(&self, path: &Path, tags: &[TagId]) -> Result<Vec<(TagId, String)>>;

    /// Write raw values to the file.
    fn write(&self, path: &Path, values: &[(TagId, String)]) -> Result<()>;
}
