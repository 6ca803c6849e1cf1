//! Snapshot comparison.

use tracing::warn;

use super::snapshot::Snapshot;
use super::{ChangeKind, ChangeRecord};
use crate::webdav::FileEntry;

/// Classify every transition for `watch_root` between two snapshots.
///
/// Output order carries no meaning.
pub(crate) fn compare(watch_root: &str, prior: &Snapshot, current: &Snapshot) -> Vec<ChangeRecord> {
    let prefix = format!("{watch_root}:");
    let mut changes = Vec::new();

    for (key, entry) in current.files.iter().filter(|(k, _)| k.starts_with(&prefix)) {
        match prior.files.get(key) {
            None => changes.push(record(ChangeKind::Created, entry)),
            Some(prev) if differs(prev, entry) => {
                if entry.etag == prev.etag && entry.mtime < prev.mtime {
                    warn!(path = %entry.path, "modification time went backwards without an ETag change");
                }
                changes.push(record(ChangeKind::Updated, entry));
            }
            Some(_) => {}
        }
    }

    for (key, entry) in prior.files.iter().filter(|(k, _)| k.starts_with(&prefix)) {
        if !current.files.contains_key(key) {
            changes.push(record(ChangeKind::Deleted, entry));
        }
    }

    changes
}

/// ETag first: it is the cheapest discriminator and usually conclusive.
fn differs(prev: &FileEntry, current: &FileEntry) -> bool {
    current.etag != prev.etag || current.size != prev.size || current.mtime != prev.mtime
}

fn record(kind: ChangeKind, entry: &FileEntry) -> ChangeRecord {
    ChangeRecord {
        kind,
        path: entry.path.clone(),
        old_path: None,
        is_dir: entry.is_dir,
        size: entry.size,
        mtime: entry.mtime,
    }
}
