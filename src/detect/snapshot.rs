//! Persistent snapshot of the last observed remote state.
//!
//! One JSON file holds every tracked watch root. Writes go through a temp
//! file in the target directory followed by an atomic rename, so readers see
//! either the previous snapshot or the new one, never a torn file.

use std::collections::HashMap;
use std::fs::DirBuilder;
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::fs::DirBuilderExt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::{DetectError, DetectResult};
use crate::webdav::{zero_time, FileEntry};

/// Point-in-time record of every tracked watch root.
///
/// `files` is keyed by the composite key `"<watch-root>:<path>"` so the same
/// remote path under two different watch roots never aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: HashMap<String, FileEntry>,
    /// Last observed ETag per traversed directory, keyed by absolute path
    #[serde(
        rename = "directory_etags",
        default,
        deserialize_with = "null_as_default"
    )]
    pub dir_etags: HashMap<String, String>,
    #[serde(default = "zero_time")]
    pub last_update: DateTime<Utc>,
}

/// Older snapshots may carry `null` where a map is expected.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Snapshot {
    /// An empty snapshot with the zero timestamp, as used before any run.
    pub fn empty() -> Self {
        Self {
            files: HashMap::new(),
            dir_etags: HashMap::new(),
            last_update: zero_time(),
        }
    }

    /// An empty snapshot stamped with the current time.
    pub fn fresh() -> Self {
        Self {
            last_update: Utc::now(),
            ..Self::empty()
        }
    }

    /// Composite key scoping `path` to `watch_root`.
    pub fn key(watch_root: &str, path: &str) -> String {
        format!("{watch_root}:{path}")
    }
}

/// Loads and persists snapshots at a fixed path.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the last persisted snapshot.
    ///
    /// A missing file bootstraps an empty snapshot; a file that exists but
    /// cannot be decoded is a [`DetectError::Corrupt`].
    pub async fn load(&self) -> DetectResult<Snapshot> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let snapshot: Snapshot =
                    serde_json::from_slice(&bytes).map_err(DetectError::Corrupt)?;
                Ok(snapshot)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot yet, starting empty");
                Ok(Snapshot::empty())
            }
            Err(e) => Err(DetectError::Persistence(e)),
        }
    }

    /// Atomically replace the snapshot file, creating its directory if needed.
    pub async fn save(&self, snapshot: &Snapshot) -> DetectResult<()> {
        let data = serde_json::to_vec(snapshot)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let path = self.path.clone();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        tokio::task::spawn_blocking(move || -> io::Result<()> {
            let mut dirs = DirBuilder::new();
            dirs.recursive(true);
            #[cfg(unix)]
            dirs.mode(0o755);
            dirs.create(&parent)?;
            let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
            tmp.write_all(&data)?;
            tmp.flush()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;

        debug!(path = %self.path.display(), "snapshot saved");
        Ok(())
    }
}
