//! Retimer - capture timestamp reconciliation and correction
//!
//! This library crate exposes the engine behind the `retimer` binary:
//! evidence reconciliation, anchor interpolation, write-back and the
//! session that drives them in batch passes.

pub mod batch;
pub mod config;
pub mod error;
pub mod interpolate;
pub mod media;
pub mod reconcile;
pub mod scanner;
pub mod session;
pub mod writeback;

pub use batch::{FileFailure, Pass, PassKind};
pub use error::{Error, Result};
pub use interpolate::DeltaInterpolator;
pub use media::{FileSummary, MediaFile, TimestampSource};
pub use reconcile::TagReconciler;
pub use session::Session;
pub use writeback::{WriteBackEngine, WriteOutcome};
