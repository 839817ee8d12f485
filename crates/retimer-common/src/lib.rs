//! Retimer-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across retimer:
//!
//! - **Path Utilities**: Functions to detect media, playlist and clip files by extension
//! - **Time Utilities**: UTC offset parsing, whole-second rounding, correction deltas
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use retimer_common::paths::is_video_file;
//! use retimer_common::time::{format_delta, parse_delta};
//! use std::path::Path;
//!
//! assert!(is_video_file(Path::new("00127.MTS")));
//!
//! let delta = parse_delta("-2h").unwrap();
//! assert_eq!(format_delta(delta), "-2:00:00");
//! ```

pub mod error;
pub mod paths;
pub mod time;

pub use error::{Error, Result};
