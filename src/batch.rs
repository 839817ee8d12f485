//! Progress-reporting batch passes over a session.
//!
//! A [`Pass`] is an iterator of strictly increasing progress values ending at
//! `1.0`. Each pulled value performs one unit of blocking work: a preparation
//! step, one step per file, then a completion step. Dropping a pass early
//! cancels it; every file already visited has been processed completely.

use crate::session::Session;
use serde::Serialize;
use std::fmt;
use std::iter::FusedIterator;
use std::path::PathBuf;

/// A file a pass could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

impl FileFailure {
    pub fn new(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for FileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// The work a pass performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Re-read AVCHD indexes and reconcile every file.
    Reload,
    /// Assign interpolated deltas and lock flags.
    Recompute,
    /// Write corrections back to every namespace.
    WriteBack,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reload => "reload",
            Self::Recompute => "recompute",
            Self::WriteBack => "write-back",
        })
    }
}

/// A single, non-restartable pass. Holds the session exclusively.
pub struct Pass<'s> {
    session: &'s mut Session,
    kind: PassKind,
    targets: Vec<usize>,
    step: usize,
    failures: Vec<FileFailure>,
}

impl<'s> Pass<'s> {
    pub(crate) fn new(
        session: &'s mut Session,
        kind: PassKind,
        targets: Vec<usize>,
        failures: Vec<FileFailure>,
    ) -> Self {
        Self {
            session,
            kind,
            targets,
            step: 0,
            failures,
        }
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Number of files the pass visits.
    pub fn file_count(&self) -> usize {
        self.targets.len()
    }

    /// Failures collected so far.
    pub fn failures(&self) -> &[FileFailure] {
        &self.failures
    }

    /// Drive the pass to completion.
    pub fn finish(mut self) -> Vec<FileFailure> {
        self.by_ref().for_each(drop);
        self.failures
    }

    fn total_steps(&self) -> usize {
        self.targets.len() + 2
    }
}

impl Iterator for Pass<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let total = self.total_steps();
        if self.step >= total {
            return None;
        }
        let step = self.step;
        self.step += 1;

        if step == 0 {
            self.session.begin_pass(self.kind, &mut self.failures);
        } else if step == total - 1 {
            self.session.end_pass(self.kind, &mut self.failures);
        } else {
            let index = self.targets[step - 1];
            self.session.process(self.kind, index, &mut self.failures);
        }
        Some(step as f64 / (total - 1) as f64)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total_steps() - self.step.min(self.total_steps());
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Pass<'_> {}

impl FusedIterator for Pass<'_> {}
