//! Keeps the unified order in step with the pinned-path and bookmark
//! collections without disturbing the relative order of surviving entries.

use crate::identity::{identity_of_bookmark, identity_of_path};
use crate::models::{Bookmark, EntryKind, IdentityClass, OrderEntry, PathKind};
use crate::probe::PathProbe;
use std::collections::{HashMap, HashSet};

pub async fn reconcile(
    order: &[OrderEntry],
    pinned_paths: &[String],
    bookmarks: &[Bookmark],
    probe: &dyn PathProbe,
) -> Vec<OrderEntry> {
    let classified = classify_missing(order, pinned_paths, probe).await;
    assemble(order, pinned_paths, bookmarks, &classified)
}

/// Probes every pinned path that has no entry in `order` yet. Failures and
/// vanished paths fall back to `EntryKind::File`.
pub async fn classify_missing(
    order: &[OrderEntry],
    pinned_paths: &[String],
    probe: &dyn PathProbe,
) -> HashMap<String, EntryKind> {
    let ordered = order
        .iter()
        .filter(|entry| entry.kind.class() == IdentityClass::Path)
        .map(|entry| entry.id.as_str())
        .collect::<HashSet<_>>();

    let mut classified = HashMap::new();
    for path in pinned_paths {
        let id = identity_of_path(path);
        if ordered.contains(id.as_str()) || classified.contains_key(&id) {
            continue;
        }
        let kind = match probe.stat(path).await {
            Ok(PathKind::Directory) => EntryKind::Folder,
            Ok(PathKind::File) => EntryKind::File,
            Ok(PathKind::Missing) => {
                tracing::debug!(path = %path, "pinned path vanished before classification; treating as file");
                EntryKind::File
            }
            Err(error) => {
                tracing::debug!(path = %path, error = %error, "path probe failed; treating as file");
                EntryKind::File
            }
        };
        classified.insert(id, kind);
    }
    classified
}

/// Pure half of reconciliation: drops stale and duplicate entries, then appends
/// every valid identity the order lacks, pinned paths first, then bookmarks,
/// each in collection order.
pub fn assemble(
    order: &[OrderEntry],
    pinned_paths: &[String],
    bookmarks: &[Bookmark],
    classified: &HashMap<String, EntryKind>,
) -> Vec<OrderEntry> {
    let path_ids = pinned_paths
        .iter()
        .map(|path| identity_of_path(path))
        .collect::<Vec<_>>();
    let bookmark_ids = bookmarks.iter().map(identity_of_bookmark).collect::<Vec<_>>();

    let valid = path_ids
        .iter()
        .map(|id| (IdentityClass::Path, id.as_str()))
        .chain(bookmark_ids.iter().map(|id| (IdentityClass::Bookmark, id.as_str())))
        .collect::<HashSet<_>>();

    let mut seen = HashSet::with_capacity(valid.len());
    let mut next = Vec::with_capacity(valid.len());
    let mut dropped = 0usize;
    for entry in order {
        let key = entry.key();
        if valid.contains(&key) && seen.insert(key) {
            next.push(entry.clone());
        } else {
            dropped += 1;
        }
    }

    let mut appended = 0usize;
    for id in &path_ids {
        if seen.insert((IdentityClass::Path, id.as_str())) {
            let kind = classified.get(id).copied().unwrap_or(EntryKind::File);
            next.push(OrderEntry::new(kind, id.clone()));
            appended += 1;
        }
    }
    for id in &bookmark_ids {
        if seen.insert((IdentityClass::Bookmark, id.as_str())) {
            next.push(OrderEntry::new(EntryKind::Bookmark, id.clone()));
            appended += 1;
        }
    }

    if dropped > 0 || appended > 0 {
        tracing::debug!(dropped, appended, total = next.len(), "reconciled unified order");
    }
    next
}
