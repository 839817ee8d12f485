//! # retimer-tags
//!
//! Typed access to the timestamp tags carried by photos and videos.
//!
//! This crate provides:
//! - A closed [`TagId`] set covering EXIF, XMP, IPTC, QuickTime and Nikon
//!   timestamp fields, with their exiv2-style keys and exiftool names
//! - [`TagValue`] parsing and rendering in each family's native layout
//! - The [`TagStore`] / [`TagProbe`] collaborator traits
//! - An [`Exiftool`] backend implementing both, and an in-memory
//!   [`MemoryBackend`] for tests and dry runs
//!
//! ## Example
//!
//! ```
//! use retimer_tags::{TagId, TagValue};
//!
//! let tag: TagId = "Xmp.xmp.CreateDate".parse()?;
//! let value = TagValue::parse(tag, "2020-06-01T09:00:00")?;
//! assert_eq!(value.to_native(), "2020-06-01T09:00:00+00:00");
//! # Ok::<(), retimer_tags::Error>(())
//! ```

mod error;
pub mod exiftool;
pub mod memory;
pub mod probe;
pub mod store;
pub mod tag;
pub mod tools;
pub mod value;

// Re-exports
pub use error::{Error, Result};
pub use exiftool::Exiftool;
pub use memory::MemoryBackend;
pub use probe::TagProbe;
pub use store::{TagStore, TagStoreProvider};
pub use tag::{Awareness, Namespace, Precision, TagId, ValueKind};
pub use tools::{check_tool, check_tools, require_tool, ToolInfo};
pub use value::{TagValue, TimestampCandidate};
