//! ETag-optimized recursive walker.
//!
//! Enumerates a subtree with one PROPFIND per directory, skipping descent
//! wherever the caller can prove a subdirectory is unchanged. The walker does
//! not know about snapshots; prior knowledge arrives through the
//! [`DirectoryOracle`] capabilities.

use std::collections::VecDeque;

use tracing::debug;

use crate::webdav::{is_hidden, DavFs, DavResult, FileEntry};

/// Prior knowledge about a subdirectory, supplied by the caller.
pub struct ProbeHit {
    /// ETag recorded for the directory on the previous run
    pub etag: String,
    /// Entries previously recorded beneath the directory
    pub entries: Vec<FileEntry>,
}

/// Capabilities the walker needs from its caller.
pub trait DirectoryOracle: Send {
    /// Prior ETag and entries for `dir`, if anything is known about it.
    fn probe(&self, dir: &str) -> Option<ProbeHit>;

    /// Report the ETag `dir` currently carries on the server.
    fn record(&mut self, dir: &str, etag: &str);
}

/// Recursively enumerate `root`, excluding `root` itself.
///
/// `root_etag` is the ETag the caller already observed for `root`; every
/// subdirectory's ETag is the one seen on its parent's listing, carried on
/// the work-queue record. A directory whose probed ETag matches is emitted
/// from the prior entries without any further PROPFIND inside it.
///
/// When `include_hidden` is false, hidden files are omitted and hidden
/// directories are still descended with their own entry omitted, so nested
/// non-hidden items keep surfacing.
pub async fn walk(
    fs: &dyn DavFs,
    root: &str,
    root_etag: &str,
    include_hidden: bool,
    oracle: &mut dyn DirectoryOracle,
) -> DavResult<Vec<FileEntry>> {
    let mut results = Vec::new();
    let mut queue: VecDeque<(String, String)> = VecDeque::new();
    queue.push_back((root.to_string(), root_etag.to_string()));

    while let Some((dir, etag)) = queue.pop_front() {
        if !etag.is_empty() {
            oracle.record(&dir, &etag);
        }

        if let Some(hit) = oracle.probe(&dir) {
            if !hit.etag.is_empty() && hit.etag == etag {
                debug!(%dir, "directory unchanged, reusing prior entries");
                for entry in hit.entries {
                    // the parent listing already emitted the directory itself
                    if entry.path == dir {
                        continue;
                    }
                    if !include_hidden && is_hidden(&entry.path) {
                        continue;
                    }
                    results.push(entry);
                }
                continue;
            }
        }

        // always request hidden entries; filtering happens here so hidden
        // directories can still be descended
        let children = fs.list_children(&dir, true).await?;
        for child in children {
            if child.is_dir {
                queue.push_back((child.path.clone(), child.etag.clone()));
            }
            if include_hidden || !is_hidden(&child.path) {
                results.push(child);
            }
        }
    }

    Ok(results)
}
