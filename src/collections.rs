use crate::errors::{AppError, AppResult};
use crate::models::{Bookmark, OrderEntry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub const PINNED_ITEMS_KEY: &str = "pinnedItems";
pub const PINNED_TOP_ITEMS_KEY: &str = "pinnedTopItems";
pub const BOOKMARKS_KEY: &str = "bookmarks";
pub const BOOKMARKS_TOP_KEY: &str = "bookmarksTop";
pub const UNIFIED_ORDER_KEY: &str = "unifiedOrder";

/// Workspace-scoped key-value persistence supplied by the host.
pub trait KeyValueStore: Send + Sync {
    fn get_value(&self, key: &str) -> AppResult<Option<serde_json::Value>>;
    fn update_value(&self, key: &str, value: serde_json::Value) -> AppResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionsSnapshot {
    pub pinned_paths: Vec<String>,
    pub top_paths: Vec<String>,
    pub bookmarks: Vec<Bookmark>,
    pub top_bookmarks: Vec<String>,
}

#[derive(Clone)]
pub struct PersistedCollections {
    store: Arc<dyn KeyValueStore>,
}

impl PersistedCollections {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn pinned_paths(&self) -> AppResult<Vec<String>> {
        self.read_list(PINNED_ITEMS_KEY)
    }

    pub fn set_pinned_paths(&self, paths: &[String]) {
        self.write(PINNED_ITEMS_KEY, paths);
    }

    pub fn top_paths(&self) -> AppResult<Vec<String>> {
        self.read_list(PINNED_TOP_ITEMS_KEY)
    }

    pub fn set_top_paths(&self, paths: &[String]) {
        self.write(PINNED_TOP_ITEMS_KEY, paths);
    }

    pub fn bookmarks(&self) -> AppResult<Vec<Bookmark>> {
        self.read_list(BOOKMARKS_KEY)
    }

    pub fn set_bookmarks(&self, bookmarks: &[Bookmark]) {
        self.write(BOOKMARKS_KEY, bookmarks);
    }

    pub fn top_bookmarks(&self) -> AppResult<Vec<String>> {
        self.read_list(BOOKMARKS_TOP_KEY)
    }

    pub fn set_top_bookmarks(&self, ids: &[String]) {
        self.write(BOOKMARKS_TOP_KEY, ids);
    }

    pub fn unified_order(&self) -> AppResult<Vec<OrderEntry>> {
        self.read_list(UNIFIED_ORDER_KEY)
    }

    pub fn set_unified_order(&self, order: &[OrderEntry]) {
        self.write(UNIFIED_ORDER_KEY, order);
    }

    pub fn snapshot(&self) -> AppResult<CollectionsSnapshot> {
        Ok(CollectionsSnapshot {
            pinned_paths: self.pinned_paths()?,
            top_paths: self.top_paths()?,
            bookmarks: self.bookmarks()?,
            top_bookmarks: self.top_bookmarks()?,
        })
    }

    /// An absent key reads as an empty list. Store failures and values that
    /// are not lists are errors so callers never write back a truncated
    /// collection; individual malformed entries are skipped.
    fn read_list<T>(&self, key: &str) -> AppResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let items = match self.store.get_value(key)? {
            None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
            Some(serde_json::Value::Array(items)) => items,
            Some(other) => {
                return Err(AppError::Internal(format!(
                    "persisted collection {key} is not a list: {other}"
                )))
            }
        };

        let mut values = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match serde_json::from_value(item) {
                Ok(value) => values.push(value),
                Err(error) => {
                    tracing::warn!(key, index, error = %error, "skipping malformed collection entry");
                }
            }
        }
        Ok(values)
    }

    fn write<T>(&self, key: &str, value: &T)
    where
        T: Serialize + ?Sized,
    {
        let result = serde_json::to_value(value)
            .map_err(AppError::from)
            .and_then(|raw| self.store.update_value(key, raw));
        if let Err(error) = result {
            tracing::error!(key, error = %error, "failed to persist collection; in-memory state may be lost on reload");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{KeyValueStore, PersistedCollections, BOOKMARKS_KEY, PINNED_ITEMS_KEY};
    use crate::errors::{AppError, AppResult};
    use crate::models::{Bookmark, EntryKind, OrderEntry};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub(crate) struct MemoryStore {
        values: Mutex<HashMap<String, serde_json::Value>>,
        pub(crate) fail_writes: AtomicBool,
        pub(crate) failing_reads: AtomicUsize,
    }

    impl MemoryStore {
        pub(crate) fn raw(&self, key: &str) -> Option<serde_json::Value> {
            self.values.lock().expect("memory store lock").get(key).cloned()
        }

        pub(crate) fn seed(&self, key: &str, value: serde_json::Value) {
            self.values
                .lock()
                .expect("memory store lock")
                .insert(key.to_string(), value);
        }
    }

    impl KeyValueStore for MemoryStore {
        fn get_value(&self, key: &str) -> AppResult<Option<serde_json::Value>> {
            let failing = self
                .failing_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
            if failing.is_ok() {
                return Err(AppError::Storage("database is locked".to_string()));
            }
            Ok(self.raw(key))
        }

        fn update_value(&self, key: &str, value: serde_json::Value) -> AppResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Storage("disk full".to_string()));
            }
            self.seed(key, value);
            Ok(())
        }
    }

    #[test]
    fn absent_keys_read_as_empty() {
        let collections = PersistedCollections::new(Arc::new(MemoryStore::default()));
        assert!(collections.pinned_paths().expect("pinned").is_empty());
        assert!(collections.bookmarks().expect("bookmarks").is_empty());
        assert!(collections.unified_order().expect("order").is_empty());
    }

    #[test]
    fn typed_accessors_round_trip() {
        let collections = PersistedCollections::new(Arc::new(MemoryStore::default()));
        collections.set_pinned_paths(&["/a".to_string(), "/b".to_string()]);
        collections.set_top_paths(&["/b".to_string()]);
        collections.set_bookmarks(&[Bookmark::new("/f.ts", 9, 0, "foo")]);
        collections.set_unified_order(&[OrderEntry::new(EntryKind::Folder, "/a")]);

        let snapshot = collections.snapshot().expect("snapshot");
        assert_eq!(snapshot.pinned_paths, vec!["/a", "/b"]);
        assert_eq!(snapshot.top_paths, vec!["/b"]);
        assert_eq!(snapshot.bookmarks[0].label, "foo");
        assert_eq!(collections.unified_order().expect("order")[0].kind, EntryKind::Folder);
    }

    #[test]
    fn non_list_value_is_an_error() {
        let store = Arc::new(MemoryStore::default());
        store.seed(PINNED_ITEMS_KEY, json!({ "not": "a list" }));
        let collections = PersistedCollections::new(store);
        assert!(collections.pinned_paths().is_err());
    }

    #[test]
    fn store_read_failure_is_reported() {
        let store = Arc::new(MemoryStore::default());
        store.seed(PINNED_ITEMS_KEY, json!(["/a"]));
        store.failing_reads.store(1, Ordering::SeqCst);
        let collections = PersistedCollections::new(store);

        assert!(matches!(collections.pinned_paths(), Err(AppError::Storage(_))));
        assert_eq!(collections.pinned_paths().expect("second read"), vec!["/a"]);
    }

    #[test]
    fn malformed_bookmark_is_skipped_without_dropping_the_rest() {
        let store = Arc::new(MemoryStore::default());
        store.seed(
            BOOKMARKS_KEY,
            json!([
                {"path": "/a", "line": 1, "character": 0, "label": "a", "timestamp": 1704067200000_i64},
                {"path": "/b", "line": 2, "character": 0, "label": "b"}
            ]),
        );
        let collections = PersistedCollections::new(store);
        let bookmarks = collections.bookmarks().expect("bookmarks");
        assert_eq!(bookmarks.len(), 1);
        assert_eq!(bookmarks[0].path, "/a");
    }

    #[test]
    fn failed_write_does_not_panic() {
        let store = Arc::new(MemoryStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let collections = PersistedCollections::new(store);
        collections.set_pinned_paths(&["/a".to_string()]);
        assert!(collections.pinned_paths().expect("pinned").is_empty());
    }
}
