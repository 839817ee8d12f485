//! exiftool-backed tag store and probe.
//!
//! Store reads use `exiftool -json -G1 -n`, probes use the short text form
//! `exiftool -s -d "%Y:%m:%d %H:%M:%S"`, and writes pass
//! `-overwrite_original` so no `_original` backup files are left behind.

use crate::probe::TagProbe;
use crate::store::{TagStore, TagStoreProvider};
use crate::tools::{get_tool_path, EXIFTOOL};
use crate::value::EXIF_FORMAT;
use crate::{Error, Result, TagId};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, warn};

/// Handle on an exiftool executable.
#[derive(Debug, Clone)]
pub struct Exiftool {
    program: PathBuf,
}

impl Exiftool {
    /// Use a specific executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locate exiftool, preferring a configured path over `PATH`.
    pub fn locate(configured: Option<&Path>) -> Result<Self> {
        get_tool_path(EXIFTOOL, configured).map(Self::new)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(&self, args: Vec<OsString>) -> Result<Output> {
        debug!(program = %self.program.display(), ?args, "Running exiftool");
        Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    Error::tool_not_found(EXIFTOOL)
                } else {
                    Error::Io(e)
                }
            })
    }

    fn read_tags(&self, path: &Path, tags: &[TagId]) -> Result<BTreeMap<TagId, String>> {
        let mut args: Vec<OsString> = vec!["-json".into(), "-G1".into(), "-n".into()];
        args.extend(tags.iter().map(|t| OsString::from(format!("-{}", t.exiftool_name()))));
        args.push(path.into());

        let output = self.run(args)?;
        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| Error::parse_error(EXIFTOOL, format!("Invalid UTF-8: {}", e)))?;

        if stdout.trim().is_empty() {
            if output.status.success() {
                return Ok(BTreeMap::new());
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool_failed(EXIFTOOL, stderr.trim()));
        }

        parse_json_output(path, &stdout, tags)
    }

    fn write_tags(&self, path: &Path, values: &[(TagId, String)]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let mut args: Vec<OsString> = vec!["-overwrite_original".into()];
        args.extend(
            values
                .iter()
                .map(|(tag, value)| OsString::from(format!("-{}={}", tag.exiftool_name(), value))),
        );
        args.push(path.into());

        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool_failed(EXIFTOOL, stderr.trim()));
        }
        debug!(path = %path.display(), tags = values.len(), "exiftool wrote tags");
        Ok(())
    }
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(json_text).collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        _ => None,
    }
}

/// Pick the requested tags out of `exiftool -json -G1` output.
pub(crate) fn parse_json_output(
    path: &Path,
    stdout: &str,
    tags: &[TagId],
) -> Result<BTreeMap<TagId, String>> {
    let entries: Vec<serde_json::Map<String, Value>> = serde_json::from_str(stdout)?;
    let Some(entry) = entries.into_iter().next() else {
        return Ok(BTreeMap::new());
    };

    if let Some(message) = entry.get("ExifTool:Error").or_else(|| entry.get("Error")) {
        debug!(path = %path.display(), error = %message, "exiftool cannot read file");
        return Err(Error::unsupported(path));
    }

    let mut values = BTreeMap::new();
    for tag in tags {
        if let Some(text) = entry.get(tag.exiftool_name()).and_then(json_text) {
            values.insert(*tag, text);
        }
    }
    Ok(values)
}

/// Parse `exiftool -s` lines (`Name   : value`) into requested tags.
///
/// Lines naming a tag outside `tags` are logged and dropped.
pub(crate) fn parse_probe_output(stdout: &str, tags: &[TagId]) -> Vec<(TagId, String)> {
    let mut values = Vec::new();
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let Some((name, value)) = line.split_once(':') else {
            warn!(line, "Ignoring malformed exiftool line");
            continue;
        };
        let name = name.trim();
        match tags.iter().find(|t| t.short_name() == name) {
            Some(tag) => values.push((*tag, value.trim().to_string())),
            None => warn!(tag = name, "Ignoring unrequested exiftool tag"),
        }
    }
    values
}

struct ExiftoolStore {
    tool: Exiftool,
    path: PathBuf,
    values: BTreeMap<TagId, String>,
    pending: Vec<(TagId, String)>,
}

impl TagStore for ExiftoolStore {
    fn path(&self) -> &Path {
        &self.path
    }

    fn get(&self, tag: TagId) -> Option<String> {
        self.values.get(&tag).cloned()
    }

    fn set(&mut self, tag: TagId, value: String) {
        self.pending.retain(|(t, _)| *t != tag);
        self.pending.push((tag, value.clone()));
        self.values.insert(tag, value);
    }

    fn write(&mut self) -> Result<()> {
        self.tool.write_tags(&self.path, &self.pending)?;
        self.pending.clear();
        Ok(())
    }
}

impl TagStoreProvider for Exiftool {
    fn name(&self) -> &'static str {
        EXIFTOOL
    }

    fn open(&self, path: &Path) -> Result<Box<dyn TagStore>> {
        if !path.exists() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {}", path.display()),
            )));
        }
        let tags: Vec<TagId> = TagId::store_tags().collect();
        let values = self.read_tags(path, &tags)?;
        Ok(Box::new(ExiftoolStore {
            tool: self.clone(),
            path: path.to_path_buf(),
            values,
            pending: Vec::new(),
        }))
    }
}

impl TagProbe for Exiftool {
    fn name(&self) -> &'static str {
        EXIFTOOL
    }

    fn probe(&self, path: &Path, tags: &[TagId]) -> Result<Vec<(TagId, String)>> {
        let mut args: Vec<OsString> = vec!["-s".into(), "-d".into(), EXIF_FORMAT.into()];
        args.extend(tags.iter().map(|t| OsString::from(format!("-{}", t.exiftool_name()))));
        args.push(path.into());

        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool_failed(EXIFTOOL, stderr.trim()));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_probe_output(&stdout, tags))
    }

    fn write(&self, path: &Path, values: &[(TagId, String)]) -> Result<()> {
        self.write_tags(path, values)
    }
}
