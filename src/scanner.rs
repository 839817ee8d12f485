//! Input enumeration.
//!
//! Turns the paths given on the command line into a sorted, de-duplicated
//! list of absolute file paths, discovers AVCHD roots (`…/AVCHD/BDMV`) while
//! walking directories, and computes display paths relative to the common
//! prefix of the set.

use crate::{Error, Result};
use retimer_common::paths::{is_hidden, is_image_file, is_video_file};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// How directories are walked.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub follow_links: bool,
    pub include_hidden: bool,
    /// Only keep image and video files found inside directories.
    pub media_only: bool,
    /// Trailing path components identifying an AVCHD root.
    pub avchd_root: PathBuf,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            follow_links: true,
            include_hidden: false,
            media_only: true,
            avchd_root: PathBuf::from("AVCHD/BDMV"),
        }
    }
}

/// One enumerated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub display_path: String,
}

/// Result of enumerating inputs.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    pub files: Vec<ScannedFile>,
    pub avchd_roots: Vec<PathBuf>,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

/// Enumerate files and AVCHD roots under `inputs`.
///
/// Explicit files are always kept. A missing input is an error.
pub fn scan(inputs: &[PathBuf], options: &ScanOptions) -> Result<Scan> {
    let mut files = Vec::new();
    let mut roots = Vec::new();

    for input in inputs {
        let input = absolute(input)?;
        if input.is_file() {
            files.push(input);
            continue;
        }
        if !input.is_dir() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("File {} does not exist", input.display()),
            )));
        }

        let walker = WalkDir::new(&input)
            .follow_links(options.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| options.include_hidden || e.depth() == 0 || !is_hidden(e.path()));
        for entry in walker {
            let entry = entry.map_err(|e| {
                Error::Io(e.into_io_error().unwrap_or_else(|| io::Error::other("walk loop")))
            })?;
            let path = entry.path();
            if entry.file_type().is_dir() {
                if path.ends_with(&options.avchd_root) {
                    debug!(root = %path.display(), "Found AVCHD root");
                    roots.push(path.to_path_buf());
                }
                continue;
            }
            if options.media_only && !is_image_file(path) && !is_video_file(path) {
                continue;
            }
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files.dedup();
    roots.sort();
    roots.dedup();

    let display = display_paths(&files);
    info!(files = files.len(), avchd_roots = roots.len(), "Scanned inputs");
    Ok(Scan {
        files: files
            .into_iter()
            .zip(display)
            .map(|(path, display_path)| ScannedFile { path, display_path })
            .collect(),
        avchd_roots: roots,
    })
}

fn common_prefix(paths: &[PathBuf]) -> PathBuf {
    let Some((first, rest)) = paths.split_first() else {
        return PathBuf::new();
    };
    if rest.is_empty() {
        return first.parent().map(Path::to_path_buf).unwrap_or_default();
    }
    let mut prefix: Vec<Component<'_>> = first.components().collect();
    for path in rest {
        let shared = prefix
            .iter()
            .zip(path.components())
            .take_while(|(a, b)| *a == b)
            .count();
        prefix.truncate(shared);
    }
    prefix.iter().collect()
}

/// Paths relative to the common prefix of the set.
///
/// A single file shows its file name; when the only shared prefix is the
/// filesystem root the full path is kept.
pub fn display_paths(paths: &[PathBuf]) -> Vec<String> {
    let prefix = common_prefix(paths);
    let trivial = prefix.components().all(|c| matches!(c, Component::RootDir | Component::Prefix(_)));
    paths
        .iter()
        .map(|path| match path.strip_prefix(&prefix) {
            Ok(rest) if !trivial && !rest.as_os_str().is_empty() => rest.display().to_string(),
            _ => path.display().to_string(),
        })
        .collect()
}
