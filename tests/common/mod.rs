//! Shared fixtures for integration tests.
//!
//! Provides a synthetic AVCHD card builder and a [`Session`] wired to an
//! in-memory tag backend, so tests never need exiftool or real footage.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime, Timelike};
use retimer::Session;
use retimer_avchd::mpl::{packed, COUNT_OFFSET, DESCRIPTOR_LEN, SIGNATURE, TRAILER_LEN};
use retimer_common::time::utc;
use retimer_tags::MemoryBackend;
use tempfile::TempDir;

/// Bytes in front of the descriptor table of a synthetic playlist.
pub const HEADER_LEN: usize = 96;

const DESCRIPTOR_PREFIX_LEN: usize = 36;
const MARKER: [u8; 8] = [0x01, 0x03, 0x05, 0x01, 0x00, 0x00, 0x00, 0x02];

pub fn ts(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// One 66-byte clip descriptor.
pub fn descriptor(id: u16, ts: NaiveDateTime) -> Vec<u8> {
    let mut out = vec![0xEEu8; DESCRIPTOR_PREFIX_LEN];
    out.extend_from_slice(&MARKER);
    out.extend_from_slice(&id.to_be_bytes());
    out.push(0x1E);
    out.extend_from_slice(&packed::encode::<2>(ts.year() as u32).unwrap());
    for field in [ts.month(), ts.day(), ts.hour(), ts.minute(), ts.second()] {
        out.extend_from_slice(&packed::encode::<1>(field).unwrap());
    }
    out.extend_from_slice(&[0x90, 0x0A]);
    out.extend_from_slice(format!("{:4}.{:2}.{:2}", ts.year(), ts.month(), ts.day()).as_bytes());
    assert_eq!(out.len() as u64, DESCRIPTOR_LEN);
    out
}

/// A complete playlist listing `clips` in order.
pub fn playlist(clips: &[(u16, NaiveDateTime)]) -> Vec<u8> {
    let mut out = vec![0u8; HEADER_LEN];
    out[..8].copy_from_slice(SIGNATURE);
    out[COUNT_OFFSET as usize] = clips.len() as u8;
    for (id, ts) in clips {
        out.extend(descriptor(*id, *ts));
    }
    out.extend(vec![0xAAu8; TRAILER_LEN as usize]);
    out
}

/// A memory card with an `AVCHD/BDMV` tree.
pub struct Card {
    pub dir: TempDir,
}

impl Card {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("AVCHD/BDMV/PLAYLIST")).unwrap();
        fs::create_dir_all(dir.path().join("AVCHD/BDMV/STREAM")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("AVCHD/BDMV")
    }

    /// Write a playlist and an empty stream file for each of its clips.
    pub fn add_playlist(&self, name: &str, clips: &[(u16, NaiveDateTime)]) -> PathBuf {
        let path = self.root().join("PLAYLIST").join(name);
        fs::write(&path, playlist(clips)).unwrap();
        for (id, _) in clips {
            fs::write(self.clip(*id), b"mts").unwrap();
        }
        path
    }

    pub fn clip(&self, id: u16) -> PathBuf {
        self.root().join("STREAM").join(format!("{id:05}.MTS"))
    }
}

/// A session over an in-memory backend with UTC as local and target zone.
pub fn memory_session() -> (Session, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let mut session = Session::new(backend.clone(), backend.clone());
    session.set_local_offset(utc());
    session.set_target_offset(utc());
    (session, backend)
}

/// Create a small scratch file and return its path.
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"data").unwrap();
    path
}

pub fn sha256(path: &Path) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(fs::read(path).unwrap()))
}
