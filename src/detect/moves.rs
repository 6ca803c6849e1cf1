//! Move reconciliation.
//!
//! Rewrites paired delete/create records into a single `moved` record. ETag
//! identity catches server-side MOVE verbs, which preserve the ETag; the
//! size-plus-time pass catches copy-then-delete clients that mint a fresh
//! ETag on write. Both passes commit a match only when it is unique, so
//! iteration order never influences the result.

use std::collections::{HashMap, HashSet};

use chrono::Duration;

use super::snapshot::Snapshot;
use super::{ChangeKind, ChangeRecord};
use crate::webdav::FileEntry;

/// Candidate drawn from the raw change list, with its snapshot entry.
struct Candidate<'a> {
    path: &'a str,
    entry: &'a FileEntry,
}

/// Collapse delete/create pairs in `changes` into `moved` records.
///
/// Candidates are taken from the change list itself, so applying the pass a
/// second time to an already-reconciled list is a no-op.
pub(crate) fn reconcile(
    watch_root: &str,
    changes: Vec<ChangeRecord>,
    prior: &Snapshot,
    current: &Snapshot,
) -> Vec<ChangeRecord> {
    let deleted = candidates(watch_root, &changes, ChangeKind::Deleted, prior);
    let created = candidates(watch_root, &changes, ChangeKind::Created, current);
    if deleted.is_empty() || created.is_empty() {
        return changes;
    }

    let mut consumed_deleted: HashSet<String> = HashSet::new();
    let mut consumed_created: HashSet<String> = HashSet::new();
    let mut moves: Vec<ChangeRecord> = Vec::new();

    // Pass 1: ETag identity, unique on both sides
    let deleted_by_etag = group_by(&deleted, |c| (!c.entry.etag.is_empty()).then(|| c.entry.etag.clone()));
    let created_by_etag = group_by(&created, |c| (!c.entry.etag.is_empty()).then(|| c.entry.etag.clone()));
    for (etag, old) in unique_pairs(&deleted_by_etag, &created_by_etag) {
        let new = created_by_etag[&etag][0];
        moves.push(moved_record(old, new));
        consumed_deleted.insert(old.path.to_string());
        consumed_created.insert(new.path.to_string());
    }

    // Pass 2: unique size with close modification times
    let deleted_by_size = group_by(&deleted, |c| {
        (!consumed_deleted.contains(c.path)).then_some(c.entry.size)
    });
    let created_by_size = group_by(&created, |c| {
        (!consumed_created.contains(c.path)).then_some(c.entry.size)
    });
    for (size, old) in unique_pairs(&deleted_by_size, &created_by_size) {
        let new = created_by_size[&size][0];
        let delta = (new.entry.mtime - old.entry.mtime).abs();
        if delta < Duration::minutes(1) {
            moves.push(moved_record(old, new));
            consumed_deleted.insert(old.path.to_string());
            consumed_created.insert(new.path.to_string());
        }
    }

    if moves.is_empty() {
        return changes;
    }

    let mut result: Vec<ChangeRecord> = changes
        .into_iter()
        .filter(|change| match change.kind {
            ChangeKind::Deleted => !consumed_deleted.contains(&change.path),
            ChangeKind::Created => !consumed_created.contains(&change.path),
            _ => true,
        })
        .collect();
    result.extend(moves);
    result
}

/// Non-directory, positive-size records of `kind`, joined with their entry in
/// the snapshot that knows their ETag.
fn candidates<'a>(
    watch_root: &str,
    changes: &'a [ChangeRecord],
    kind: ChangeKind,
    snapshot: &'a Snapshot,
) -> Vec<Candidate<'a>> {
    changes
        .iter()
        .filter(|c| c.kind == kind && !c.is_dir && c.size > 0)
        .filter_map(|c| {
            let entry = snapshot.files.get(&Snapshot::key(watch_root, &c.path))?;
            Some(Candidate {
                path: &c.path,
                entry,
            })
        })
        .collect()
}

fn group_by<'a, 'c, K, F>(
    candidates: &'c [Candidate<'a>],
    key: F,
) -> HashMap<K, Vec<&'c Candidate<'a>>>
where
    K: std::hash::Hash + Eq,
    F: Fn(&Candidate<'a>) -> Option<K>,
{
    let mut groups: HashMap<K, Vec<&Candidate>> = HashMap::new();
    for candidate in candidates {
        if let Some(k) = key(candidate) {
            groups.entry(k).or_default().push(candidate);
        }
    }
    groups
}

/// Keys with exactly one deleted and exactly one created candidate.
fn unique_pairs<'m, 'a, 'c, K>(
    deleted: &'m HashMap<K, Vec<&'c Candidate<'a>>>,
    created: &'m HashMap<K, Vec<&'c Candidate<'a>>>,
) -> Vec<(K, &'c Candidate<'a>)>
where
    K: std::hash::Hash + Eq + Clone,
{
    deleted
        .iter()
        .filter(|(key, old)| {
            old.len() == 1 && created.get(*key).map(|new| new.len()) == Some(1)
        })
        .map(|(key, old)| (key.clone(), old[0]))
        .collect()
}

fn moved_record(old: &Candidate<'_>, new: &Candidate<'_>) -> ChangeRecord {
    ChangeRecord {
        kind: ChangeKind::Moved,
        path: new.entry.path.clone(),
        old_path: Some(old.entry.path.clone()),
        is_dir: new.entry.is_dir,
        size: new.entry.size,
        mtime: new.entry.mtime,
    }
}
