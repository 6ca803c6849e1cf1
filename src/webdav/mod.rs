//! WebDAV remote listing adapter.
//!
//! Speaks PROPFIND to a Nextcloud-style endpoint and exposes typed directory
//! listings carrying the server's ETags. The client is fronted by the [`DavFs`]
//! trait so the change detection engine can run against an in-memory fake.

mod client;
mod paths;
mod propfind;

pub use client::{DavClient, DEFAULT_TIMEOUT};
pub use paths::{is_hidden, normalize_watch_root};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata for one remote file or directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Absolute remote path with the account prefix stripped
    pub path: String,
    pub is_dir: bool,
    /// Size in bytes; directories report 0
    pub size: i64,
    /// Last modification time; the epoch when the server sent nothing usable
    #[serde(rename = "modified_time")]
    pub mtime: DateTime<Utc>,
    /// Server validator with surrounding quotes stripped
    pub etag: String,
}

/// The zero timestamp used for absent or unparseable times.
pub fn zero_time() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Error type for WebDAV operations.
#[derive(Error, Debug)]
pub enum DavError {
    /// Network, TLS, auth failure, or an unexpected HTTP status
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body that is not a usable multistatus document
    #[error("protocol error: {0}")]
    Protocol(String),

    /// PROPFIND returned no entries for the requested path
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for DavError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type alias for WebDAV operations
pub type DavResult<T> = Result<T, DavError>;

/// Remote filesystem operations needed by the walker and the detector.
#[async_trait]
pub trait DavFs: Send + Sync {
    /// One-level listing of `path`, excluding `path` itself.
    async fn list_children(&self, path: &str, include_hidden: bool) -> DavResult<Vec<FileEntry>>;

    /// Depth-0 metadata for a single resource.
    async fn stat(&self, path: &str) -> DavResult<FileEntry>;
}
