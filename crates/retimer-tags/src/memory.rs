//! In-memory tag backend.
//!
//! Implements both [`TagStoreProvider`] and [`TagProbe`] over one shared map,
//! so a dry run or a test can observe exactly what would have been written.

use crate::probe::TagProbe;
use crate::store::{TagStore, TagStoreProvider};
use crate::{Error, Result, TagId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Default)]
struct State {
    files: HashMap<PathBuf, BTreeMap<TagId, String>>,
    unsupported: HashSet<PathBuf>,
    writes: usize,
}

/// Shared in-memory tag values keyed by path. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw tag value.
    pub fn insert(&self, path: impl Into<PathBuf>, tag: TagId, value: impl Into<String>) {
        self.state
            .lock()
            .files
            .entry(path.into())
            .or_default()
            .insert(tag, value.into());
    }

    /// Make [`TagStoreProvider::open`] fail with `Unsupported` for a path.
    pub fn mark_unsupported(&self, path: impl Into<PathBuf>) {
        self.state.lock().unsupported.insert(path.into());
    }

    /// Current raw value of a tag.
    pub fn value(&self, path: &Path, tag: TagId) -> Option<String> {
        self.state
            .lock()
            .files
            .get(path)
            .and_then(|tags| tags.get(&tag).cloned())
    }

    /// All current raw values for a path.
    pub fn tags(&self, path: &Path) -> BTreeMap<TagId, String> {
        self.state.lock().files.get(path).cloned().unwrap_or_default()
    }

    /// Number of write operations that changed at least one tag.
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }

    fn apply(&self, path: &Path, values: &[(TagId, String)]) {
        if values.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        let tags = state.files.entry(path.to_path_buf()).or_default();
        for (tag, value) in values {
            tags.insert(*tag, value.clone());
        }
        state.writes += 1;
    }
}

struct MemoryStore {
    backend: MemoryBackend,
    path: PathBuf,
    values: BTreeMap<TagId, String>,
    pending: Vec<(TagId, String)>,
}

impl TagStore for MemoryStore {
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
        self.backend.apply(&self.path, &self.pending);
        self.pending.clear();
        Ok(())
    }
}

impl TagStoreProvider for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn TagStore>> {
        if self.state.lock().unsupported.contains(path) {
            return Err(Error::unsupported(path));
        }
        let values = self
            .tags(path)
            .into_iter()
            .filter(|(tag, _)| TagId::store_tags().any(|t| t == *tag))
            .collect();
        Ok(Box::new(MemoryStore {
            backend: self.clone(),
            path: path.to_path_buf(),
            values,
            pending: Vec::new(),
        }))
    }
}

impl TagProbe for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn probe(&self, path: &Path, tags: &[TagId]) -> Result<Vec<(TagId, String)>> {
        let stored = self.tags(path);
        Ok(tags
            .iter()
            .filter_map(|tag| stored.get(tag).map(|value| (*tag, value.clone())))
            .collect())
    }

    fn write(&self, path: &Path, values: &[(TagId, String)]) -> Result<()> {
        self.apply(path, values);
        Ok(())
    }
}
