//! Change detection engine.
//!
//! Walks remote trees, diffs them against the last persisted snapshot, and
//! classifies every transition as created, updated, moved, or deleted. The
//! ETag fast paths short-circuit unchanged watch roots and subtrees so a
//! quiet tree of tens of thousands of files costs a single PROPFIND.

mod compare;
mod moves;
mod snapshot;
mod walker;

pub use snapshot::{Snapshot, SnapshotStore};
pub use walker::{walk, DirectoryOracle, ProbeHit};

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::webdav::{is_hidden, normalize_watch_root, DavError, DavFs};

/// Classification of one observed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Moved,
    Deleted,
}

/// One typed change record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub path: String,
    /// Previous path, present only for moves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    pub is_dir: bool,
    pub size: i64,
    #[serde(rename = "modified")]
    pub mtime: DateTime<Utc>,
}

/// All changes observed for one watch root during a single detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryChanges {
    pub directory: String,
    pub changes: Vec<ChangeRecord>,
    pub timestamp: DateTime<Utc>,
}

/// Error type for detection runs.
#[derive(Error, Debug)]
pub enum DetectError {
    /// The remote failed while a watch root was being processed
    #[error("remote error for {directory}: {source}")]
    Remote {
        directory: String,
        source: DavError,
    },

    /// Snapshot file present but undecodable
    #[error("corrupt snapshot: {0}")]
    Corrupt(serde_json::Error),

    /// Snapshot could not be read or replaced
    #[error("snapshot persistence: {0}")]
    Persistence(#[from] io::Error),
}

/// Result type alias for detection operations
pub type DetectResult<T> = Result<T, DetectError>;

/// Detects changes across watch roots against a persistent snapshot.
///
/// One detector lives for the whole process. Runs are serialized under an
/// internal mutex so successive snapshots form a total order; listing
/// requests bypass the detector entirely and stay parallel.
pub struct Detector {
    remote: Arc<dyn DavFs>,
    store: SnapshotStore,
    run_lock: Mutex<()>,
}

impl Detector {
    pub fn new(remote: Arc<dyn DavFs>, store: SnapshotStore) -> Self {
        Self {
            remote,
            store,
            run_lock: Mutex::new(()),
        }
    }

    /// Detect changes for each requested watch root.
    ///
    /// Any remote or persistence failure aborts the whole run; the previous
    /// snapshot stays untouched in that case and no partial results escape.
    pub async fn detect(
        &self,
        directories: &[String],
        include_hidden: bool,
    ) -> DetectResult<Vec<DirectoryChanges>> {
        let _run = self.run_lock.lock().await;

        let prior = self.store.load().await?;
        info!(
            files = prior.files.len(),
            last_update = %prior.last_update,
            "loaded prior snapshot"
        );

        let mut current = Snapshot::fresh();
        let mut results = Vec::with_capacity(directories.len());

        for directory in directories {
            let root = normalize_watch_root(directory);
            let root_info = self
                .remote
                .stat(&root)
                .await
                .map_err(|source| DetectError::Remote {
                    directory: root.clone(),
                    source,
                })?;

            let prev_etag = prior.dir_etags.get(&root).cloned().unwrap_or_default();
            let cur_etag = root_info.etag.clone();

            if !prev_etag.is_empty() && prev_etag == cur_etag {
                debug!(%root, "watch root unchanged, reusing snapshot entries");
                let prefix = format!("{root}:");
                for (key, entry) in prior.files.iter().filter(|(k, _)| k.starts_with(&prefix)) {
                    if !include_hidden && is_hidden(&entry.path) {
                        continue;
                    }
                    current.files.insert(key.clone(), entry.clone());
                }
                // nothing was walked, so the subtree's directory ETags must
                // survive verbatim or the next real walk loses its fast path
                let subtree_prefix = if root == "/" {
                    "/".to_string()
                } else {
                    format!("{root}/")
                };
                for (dir, etag) in prior
                    .dir_etags
                    .iter()
                    .filter(|(dir, _)| *dir == &root || dir.starts_with(&subtree_prefix))
                {
                    current.dir_etags.insert(dir.clone(), etag.clone());
                }
            } else {
                let started = Instant::now();
                let entries = {
                    let mut oracle = SnapshotOracle {
                        watch_root: &root,
                        prior: &prior,
                        sink: &mut current.dir_etags,
                    };
                    walker::walk(
                        self.remote.as_ref(),
                        &root,
                        &cur_etag,
                        include_hidden,
                        &mut oracle,
                    )
                    .await
                    .map_err(|source| DetectError::Remote {
                        directory: root.clone(),
                        source,
                    })?
                };
                info!(
                    count = entries.len(),
                    elapsed = ?started.elapsed(),
                    %root,
                    "scanned watch root"
                );

                for entry in entries {
                    current
                        .files
                        .insert(Snapshot::key(&root, &entry.path), entry);
                }

                // The walker excludes the root itself; track it from the
                // stat, pinned to its first-observed metadata so root-level
                // churn does not drown out the per-entry records.
                let root_key = Snapshot::key(&root, &root);
                let root_entry = prior.files.get(&root_key).cloned().unwrap_or_else(|| {
                    let mut entry = root_info.clone();
                    entry.path = root.clone();
                    entry
                });
                current.files.insert(root_key, root_entry);
            }

            current.dir_etags.insert(root.clone(), cur_etag);

            let raw = compare::compare(&root, &prior, &current);
            let changes = moves::reconcile(&root, raw, &prior, &current);
            if !changes.is_empty() {
                info!(count = changes.len(), %root, "detected changes");
            }

            results.push(DirectoryChanges {
                directory: root,
                changes,
                timestamp: Utc::now(),
            });
        }

        self.store.save(&current).await?;
        Ok(results)
    }
}

/// Oracle backed by the prior snapshot, recording observed ETags into the
/// in-progress one.
struct SnapshotOracle<'a> {
    watch_root: &'a str,
    prior: &'a Snapshot,
    sink: &'a mut HashMap<String, String>,
}

impl DirectoryOracle for SnapshotOracle<'_> {
    fn probe(&self, dir: &str) -> Option<ProbeHit> {
        let etag = match self.prior.dir_etags.get(dir) {
            Some(etag) => etag.clone(),
            None => {
                // snapshots written before directory ETags were tracked
                // carry the ETag on the directory's own file entry
                let entry = self.prior.files.get(&Snapshot::key(self.watch_root, dir))?;
                if !entry.is_dir || entry.etag.is_empty() {
                    return None;
                }
                entry.etag.clone()
            }
        };

        let root_prefix = format!("{}:", self.watch_root);
        let subtree_prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{dir}/")
        };
        let entries = self
            .prior
            .files
            .iter()
            .filter(|(key, _)| key.starts_with(&root_prefix))
            .map(|(_, entry)| entry)
            .filter(|entry| entry.path == dir || entry.path.starts_with(&subtree_prefix))
            .cloned()
            .collect();

        Some(ProbeHit { etag, entries })
    }

    fn record(&mut self, dir: &str, etag: &str) {
        self.sink.insert(dir.to_string(), etag.to_string());
    }
}
