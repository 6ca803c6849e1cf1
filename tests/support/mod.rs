//! Shared in-memory WebDAV fake for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use davwatch::webdav::{is_hidden, DavError, DavFs, DavResult, FileEntry};

pub fn ts(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap()
}

pub fn dir(path: &str, etag: &str) -> FileEntry {
    FileEntry {
        path: path.to_string(),
        is_dir: true,
        size: 0,
        mtime: ts("2024-01-01T00:00:00Z"),
        etag: etag.to_string(),
    }
}

pub fn file(path: &str, size: i64, etag: &str, mtime: &str) -> FileEntry {
    FileEntry {
        path: path.to_string(),
        is_dir: false,
        size,
        mtime: ts(mtime),
        etag: etag.to_string(),
    }
}

/// Scripted remote tree with counters for issued listing and stat calls.
///
/// Each entry in a listing corresponds to one PROPFIND the real client would
/// issue, so the counters are the observability hook for the fast-path
/// guarantees.
pub struct FakeRemote {
    entries: Mutex<Vec<FileEntry>>,
    list_calls: AtomicUsize,
    stat_calls: AtomicUsize,
}

impl FakeRemote {
    pub fn new(entries: Vec<FileEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            list_calls: AtomicUsize::new(0),
            stat_calls: AtomicUsize::new(0),
        }
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn stat_count(&self) -> usize {
        self.stat_calls.load(Ordering::SeqCst)
    }

    pub fn add(&self, entry: FileEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    /// Remove an entry and everything beneath it.
    pub fn remove(&self, path: &str) {
        let prefix = format!("{path}/");
        self.entries
            .lock()
            .unwrap()
            .retain(|e| e.path != path && !e.path.starts_with(&prefix));
    }

    pub fn set_etag(&self, path: &str, etag: &str) {
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.iter_mut() {
            if entry.path == path {
                entry.etag = etag.to_string();
            }
        }
    }

    pub fn update_file(&self, path: &str, size: i64, etag: &str, mtime: &str) {
        let mut entries = self.entries.lock().unwrap();
        for entry in entries.iter_mut() {
            if entry.path == path {
                entry.size = size;
                entry.etag = etag.to_string();
                entry.mtime = ts(mtime);
            }
        }
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "/",
    }
}

#[async_trait]
impl DavFs for FakeRemote {
    async fn list_children(&self, path: &str, include_hidden: bool) -> DavResult<Vec<FileEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let entries = self.entries.lock().unwrap();
        if !entries.iter().any(|e| e.path == path) && path != "/" {
            return Err(DavError::NotFound(path.to_string()));
        }
        Ok(entries
            .iter()
            .filter(|e| e.path != path && parent_of(&e.path) == path)
            .filter(|e| include_hidden || !is_hidden(&e.path))
            .cloned()
            .collect())
    }

    async fn stat(&self, path: &str) -> DavResult<FileEntry> {
        self.stat_calls.fetch_add(1, Ordering::SeqCst);
        let entries = self.entries.lock().unwrap();
        entries
            .iter()
            .find(|e| e.path == path)
            .cloned()
            .ok_or_else(|| DavError::NotFound(path.to_string()))
    }
}
