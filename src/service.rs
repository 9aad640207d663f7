use crate::collections::{CollectionsSnapshot, KeyValueStore, PersistedCollections};
use crate::db::{Database, WorkspaceStore};
use crate::errors::AppResult;
use crate::identity::{bookmark_identity, identity_of_bookmark};
use crate::logging;
use crate::models::{
    AppSettings, Bookmark, BookmarkToggle, CoreEvent, CursorPosition, Direction, IdentityClass, LineDecorations,
    MaterializedList, OrderEntry, PathKind,
};
use crate::navigation;
use crate::ordering::{self, TopSet};
use crate::probe::PathProbe;
use crate::reconciler;
use crate::timers::{Debouncer, TimerQueue};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use tokio::sync::mpsc;
use tokio::time::Duration;

const DATABASE_FILE: &str = "state.sqlite";

pub struct ExplorerCore {
    db: Arc<Database>,
    collections: PersistedCollections,
    probe: Arc<dyn PathProbe>,
    settings: Arc<RwLock<AppSettings>>,
    timers: TimerQueue,
    context_debounce: Debouncer,
    events: Arc<RwLock<Option<mpsc::Sender<CoreEvent>>>>,
    write_lock: Arc<Mutex<()>>,
    last_order: Mutex<Vec<OrderEntry>>,
    this: Weak<ExplorerCore>,
}

impl ExplorerCore {
    /// Opens (or creates) `state.sqlite` under `data_dir` and scopes all
    /// collections to `workspace_id`.
    pub fn open(data_dir: &Path, workspace_id: &str, probe: Arc<dyn PathProbe>) -> AppResult<Arc<Self>> {
        let db = Arc::new(Database::new(&data_dir.join(DATABASE_FILE))?);
        let store = Arc::new(WorkspaceStore::new(db.clone(), workspace_id));
        let core = Self::new(db, store, probe);
        let settings = core.settings();
        if settings.logging_enabled {
            core.enable_file_logging(&settings.log_level);
        }
        Ok(core)
    }

    pub fn new(db: Arc<Database>, store: Arc<dyn KeyValueStore>, probe: Arc<dyn PathProbe>) -> Arc<Self> {
        let settings = match db.get_settings() {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(error = %error, "failed to load settings; using defaults");
                AppSettings::default()
            }
        };
        let timers = TimerQueue::new();
        let context_debounce = Debouncer::new(
            timers.clone(),
            Duration::from_millis(settings.context_debounce_ms),
        );

        Arc::new_cyclic(|this| Self {
            db,
            collections: PersistedCollections::new(store),
            probe,
            settings: Arc::new(RwLock::new(settings)),
            timers,
            context_debounce,
            events: Arc::new(RwLock::new(None)),
            write_lock: Arc::new(Mutex::new(())),
            last_order: Mutex::new(Vec::new()),
            this: this.clone(),
        })
    }

    pub fn subscribe(&self, capacity: usize) -> mpsc::Receiver<CoreEvent> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let mut writer = self.events.write().unwrap_or_else(PoisonError::into_inner);
        *writer = Some(sender);
        receiver
    }

    pub fn collections(&self) -> &PersistedCollections {
        &self.collections
    }

    pub fn snapshot(&self) -> AppResult<CollectionsSnapshot> {
        self.collections.snapshot()
    }

    pub fn settings(&self) -> AppSettings {
        self.settings.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        let settings = self.db.update_settings(update)?;
        self.apply_settings(settings.clone());
        Ok(settings)
    }

    pub fn is_pinned(&self, path: &str) -> bool {
        readable("pinned paths", self.collections.pinned_paths())
            .iter()
            .any(|pinned| pinned == path)
    }

    pub fn pin(&self, path: &str) -> bool {
        let changed = self.mutate("pin", || {
            let mut pinned = self.collections.pinned_paths()?;
            if pinned.iter().any(|existing| existing == path) {
                tracing::debug!(path, "path already pinned");
                return Ok(false);
            }
            pinned.push(path.to_string());
            self.collections.set_pinned_paths(&pinned);
            Ok(true)
        });
        if changed {
            tracing::info!(path, "pinned path");
            self.emit(CoreEvent::ListChanged);
        }
        changed
    }

    pub fn unpin(&self, path: &str) -> bool {
        let changed = self.mutate("unpin", || self.remove_paths_locked(|candidate| candidate == path));
        if changed {
            tracing::info!(path, "unpinned path");
            self.emit(CoreEvent::ListChanged);
        }
        changed
    }

    /// Returns whether the path is pinned afterwards.
    pub fn toggle_pin(&self, path: &str) -> bool {
        if self.is_pinned(path) {
            !self.unpin(path)
        } else {
            self.pin(path)
        }
    }

    /// Drops a deleted path, anything pinned beneath it, and bookmarks in
    /// those files.
    pub fn remove_deleted_path(&self, path: &str) -> bool {
        let changed = self.mutate("remove deleted path", || {
            let paths_changed = self.remove_paths_locked(|candidate| is_same_or_descendant(candidate, path))?;
            let bookmarks_changed =
                self.remove_bookmarks_locked(|bookmark| is_same_or_descendant(&bookmark.path, path))?;
            Ok(paths_changed || bookmarks_changed)
        });
        if changed {
            tracing::info!(path, "removed deleted path from pins");
            self.emit(CoreEvent::ListChanged);
        }
        changed
    }

    /// `None` when the bookmark collection could not be read; nothing is
    /// written in that case.
    pub fn toggle_bookmark(&self, path: &str, line: u32, character: u32, line_text: &str) -> Option<BookmarkToggle> {
        let outcome = self.mutate("toggle bookmark", || {
            let id = bookmark_identity(path, line);
            if self.remove_bookmarks_locked(|bookmark| identity_of_bookmark(bookmark) == id)? {
                return Ok(Some(BookmarkToggle::Removed));
            }
            let mut bookmarks = self.collections.bookmarks()?;
            bookmarks.push(Bookmark::new(path, line, character, line_text));
            self.collections.set_bookmarks(&bookmarks);
            Ok(Some(BookmarkToggle::Added))
        })?;
        tracing::info!(path, line = line.saturating_add(1), outcome = ?outcome, "toggled bookmark");
        self.emit(CoreEvent::ListChanged);
        Some(outcome)
    }

    pub fn remove_bookmark(&self, identity: &str) -> bool {
        let changed = self.mutate("remove bookmark", || {
            self.remove_bookmarks_locked(|bookmark| identity_of_bookmark(bookmark) == identity)
        });
        if changed {
            tracing::info!(identity, "removed bookmark");
            self.emit(CoreEvent::ListChanged);
        }
        changed
    }

    /// Adds the entry to the top tier. Identities that name no pinned path or
    /// existing bookmark are ignored.
    pub fn move_to_top(&self, class: IdentityClass, identity: &str) -> bool {
        let changed = self.mutate("move to top", || {
            let known = match class {
                IdentityClass::Path => self.collections.pinned_paths()?.iter().any(|path| path == identity),
                IdentityClass::Bookmark => self
                    .collections
                    .bookmarks()?
                    .iter()
                    .any(|bookmark| identity_of_bookmark(bookmark) == identity),
            };
            if !known {
                tracing::debug!(identity, class = ?class, "move to top ignored for unknown identity");
                return Ok(false);
            }
            let mut top = self.top_ids(class)?;
            let added = push_unique(&mut top, identity);
            if added {
                self.set_top_ids(class, &top);
            }
            Ok(added)
        });
        if changed {
            tracing::info!(identity, class = ?class, "moved entry to top");
            self.emit(CoreEvent::ListChanged);
        }
        changed
    }

    pub fn remove_from_top(&self, class: IdentityClass, identity: &str) -> bool {
        let changed = self.mutate("remove from top", || {
            let mut top = self.top_ids(class)?;
            let removed = retain_changed(&mut top, |id| id != identity);
            if removed {
                self.set_top_ids(class, &top);
            }
            Ok(removed)
        });
        if changed {
            tracing::info!(identity, class = ?class, "removed entry from top");
            self.emit(CoreEvent::ListChanged);
        }
        changed
    }

    /// Repairs the unified order against the collections and persists it.
    /// Path probes run without holding the write lock; the collections are
    /// re-read afterwards so concurrent edits are not lost. When a collection
    /// cannot be read the previous order is returned and nothing is written.
    pub async fn reconcile(&self) -> Vec<OrderEntry> {
        match self.try_reconcile().await {
            Ok(order) => {
                let mut last = self.last_order.lock().unwrap_or_else(PoisonError::into_inner);
                last.clone_from(&order);
                order
            }
            Err(error) => {
                tracing::error!(error = %error, "reconcile skipped; keeping the last order");
                self.last_order.lock().unwrap_or_else(PoisonError::into_inner).clone()
            }
        }
    }

    pub async fn move_in_tier(&self, class: IdentityClass, identity: &str, direction: Direction) -> bool {
        self.reconcile().await;

        let moved = self.mutate("move in tier", || {
            let order = self.collections.unified_order()?;
            let top = self.top_set()?;
            Ok(match ordering::move_in_tier(&order, &top, class, identity, direction) {
                Some(next) => {
                    self.collections.set_unified_order(&next);
                    true
                }
                None => false,
            })
        });
        if moved {
            tracing::info!(identity, class = ?class, direction = ?direction, "moved entry within tier");
            self.emit(CoreEvent::ListChanged);
        } else {
            tracing::debug!(identity, class = ?class, direction = ?direction, "move within tier was a no-op");
        }
        moved
    }

    pub async fn materialize(&self) -> MaterializedList {
        let order = self.reconcile().await;
        let top = readable("top tier", self.top_set());
        ordering::materialize(&order, &top, &self.bookmarks())
    }

    pub fn next_bookmark(&self, cursor: Option<&CursorPosition>) -> Option<Bookmark> {
        navigation::next_bookmark(&self.bookmarks(), cursor).cloned()
    }

    pub fn previous_bookmark(&self, cursor: Option<&CursorPosition>) -> Option<Bookmark> {
        navigation::previous_bookmark(&self.bookmarks(), cursor).cloned()
    }

    pub fn next_bookmark_in_file(&self, cursor: &CursorPosition) -> Option<Bookmark> {
        navigation::next_bookmark_in_file(&self.bookmarks(), cursor).cloned()
    }

    pub fn previous_bookmark_in_file(&self, cursor: &CursorPosition) -> Option<Bookmark> {
        navigation::previous_bookmark_in_file(&self.bookmarks(), cursor).cloned()
    }

    pub fn next_bookmark_file(&self, current_path: Option<&str>) -> Option<Bookmark> {
        navigation::next_bookmark_file(&self.bookmarks(), current_path).cloned()
    }

    pub fn previous_bookmark_file(&self, current_path: Option<&str>) -> Option<Bookmark> {
        navigation::previous_bookmark_file(&self.bookmarks(), current_path).cloned()
    }

    pub fn line_decorations(&self, cursor: Option<&CursorPosition>) -> LineDecorations {
        navigation::line_decorations(&self.bookmarks(), cursor)
    }

    pub fn on_cursor_changed(&self, cursor: CursorPosition) {
        self.schedule_context_update(Some(cursor));
    }

    pub fn on_active_editor_changed(&self, cursor: Option<CursorPosition>) {
        self.schedule_context_update(cursor);
    }

    pub fn on_file_deleted(&self, path: &str) {
        let delay = Duration::from_millis(self.settings().file_deletion_delay_ms);
        let weak = self.this.clone();
        let path = path.to_string();
        self.timers.schedule(delay, move || {
            if let Some(core) = weak.upgrade() {
                core.remove_deleted_path(&path);
            }
        });
    }

    pub fn on_configuration_changed(&self, cursor: Option<CursorPosition>) -> AppResult<AppSettings> {
        let settings = self.db.get_settings()?;
        self.apply_settings(settings.clone());
        self.schedule_context_update(cursor);
        Ok(settings)
    }

    pub fn shutdown(&self) {
        self.context_debounce.cancel();
        self.timers.shutdown();
        tracing::info!("explorer core shut down");
    }

    async fn try_reconcile(&self) -> AppResult<Vec<OrderEntry>> {
        if self.settings().prune_missing_on_reconcile {
            self.prune_missing().await?;
        }

        let order = self.collections.unified_order()?;
        let pinned = self.collections.pinned_paths()?;
        let classified = reconciler::classify_missing(&order, &pinned, self.probe.as_ref()).await;

        let _guard = self.lock();
        let order = self.collections.unified_order()?;
        let pinned = self.collections.pinned_paths()?;
        let bookmarks = self.collections.bookmarks()?;
        let next = reconciler::assemble(&order, &pinned, &bookmarks, &classified);
        if next != order {
            self.collections.set_unified_order(&next);
        }
        self.repair_top_locked(&pinned, &bookmarks)?;
        Ok(next)
    }

    fn schedule_context_update(&self, cursor: Option<CursorPosition>) {
        let weak = self.this.clone();
        self.context_debounce.trigger(move || {
            if let Some(core) = weak.upgrade() {
                core.publish_context(cursor.as_ref());
            }
        });
    }

    fn publish_context(&self, cursor: Option<&CursorPosition>) {
        let path = cursor.map(|cursor| cursor.path.clone());
        let is_pinned = path.as_deref().map(|path| self.is_pinned(path)).unwrap_or(false);
        tracing::debug!(path = ?path, is_pinned, "context updated");
        self.emit(CoreEvent::PinContext { path, is_pinned });
        self.emit(CoreEvent::Decorations(self.line_decorations(cursor)));
    }

    async fn prune_missing(&self) -> AppResult<()> {
        let pinned = self.collections.pinned_paths()?;
        let bookmarks = self.collections.bookmarks()?;
        let mut candidates = Vec::new();
        let mut seen = HashSet::new();
        for path in pinned.iter().chain(bookmarks.iter().map(|bookmark| &bookmark.path)) {
            if seen.insert(path.as_str()) {
                candidates.push(path.clone());
            }
        }

        let mut missing = HashSet::new();
        for path in candidates {
            match self.probe.stat(&path).await {
                Ok(PathKind::Missing) => {
                    missing.insert(path);
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::debug!(path = %path, error = %error, "existence check failed; keeping entry");
                }
            }
        }
        if missing.is_empty() {
            return Ok(());
        }

        let changed = {
            let _guard = self.lock();
            let paths_changed = self.remove_paths_locked(|path| missing.contains(path))?;
            let bookmarks_changed = self.remove_bookmarks_locked(|bookmark| missing.contains(&bookmark.path))?;
            paths_changed || bookmarks_changed
        };
        if changed {
            for path in &missing {
                tracing::info!(path = %path, "removing non-existent path from pins and bookmarks");
            }
            self.emit(CoreEvent::ListChanged);
        }
        Ok(())
    }

    /// Runs `apply` under the write lock. A collection that cannot be read
    /// aborts the whole operation before anything is written back.
    fn mutate<T: Default>(&self, operation: &'static str, apply: impl FnOnce() -> AppResult<T>) -> T {
        let _guard = self.lock();
        match apply() {
            Ok(value) => value,
            Err(error) => {
                tracing::error!(operation, error = %error, "collection unreadable; operation skipped");
                T::default()
            }
        }
    }

    fn remove_paths_locked(&self, mut matches: impl FnMut(&str) -> bool) -> AppResult<bool> {
        let mut pinned = self.collections.pinned_paths()?;
        let mut top = self.collections.top_paths()?;
        let pinned_changed = retain_changed(&mut pinned, |path| !matches(path));
        let top_changed = retain_changed(&mut top, |path| !matches(path));
        if pinned_changed {
            self.collections.set_pinned_paths(&pinned);
        }
        if top_changed {
            self.collections.set_top_paths(&top);
        }
        Ok(pinned_changed || top_changed)
    }

    fn remove_bookmarks_locked(&self, mut matches: impl FnMut(&Bookmark) -> bool) -> AppResult<bool> {
        let mut bookmarks = self.collections.bookmarks()?;
        let mut top = self.collections.top_bookmarks()?;
        let mut removed_ids = HashSet::new();
        bookmarks.retain(|bookmark| {
            if matches(bookmark) {
                removed_ids.insert(identity_of_bookmark(bookmark));
                false
            } else {
                true
            }
        });
        if removed_ids.is_empty() {
            return Ok(false);
        }
        self.collections.set_bookmarks(&bookmarks);
        if retain_changed(&mut top, |id| !removed_ids.contains(id)) {
            self.collections.set_top_bookmarks(&top);
        }
        Ok(true)
    }

    fn repair_top_locked(&self, pinned: &[String], bookmarks: &[Bookmark]) -> AppResult<()> {
        let pinned = pinned.iter().map(String::as_str).collect::<HashSet<_>>();
        let mut top_paths = self.collections.top_paths()?;
        if retain_changed(&mut top_paths, |path| pinned.contains(path)) {
            tracing::debug!("dropped top-tier paths that are no longer pinned");
            self.collections.set_top_paths(&top_paths);
        }

        let bookmark_ids = bookmarks.iter().map(identity_of_bookmark).collect::<HashSet<_>>();
        let mut top_bookmarks = self.collections.top_bookmarks()?;
        if retain_changed(&mut top_bookmarks, |id| bookmark_ids.contains(id)) {
            tracing::debug!("dropped top-tier bookmark ids without a bookmark");
            self.collections.set_top_bookmarks(&top_bookmarks);
        }
        Ok(())
    }

    fn top_ids(&self, class: IdentityClass) -> AppResult<Vec<String>> {
        match class {
            IdentityClass::Path => self.collections.top_paths(),
            IdentityClass::Bookmark => self.collections.top_bookmarks(),
        }
    }

    fn set_top_ids(&self, class: IdentityClass, ids: &[String]) {
        match class {
            IdentityClass::Path => self.collections.set_top_paths(ids),
            IdentityClass::Bookmark => self.collections.set_top_bookmarks(ids),
        }
    }

    fn top_set(&self) -> AppResult<TopSet> {
        Ok(TopSet::new(&self.collections.top_paths()?, &self.collections.top_bookmarks()?))
    }

    fn bookmarks(&self) -> Vec<Bookmark> {
        readable("bookmarks", self.collections.bookmarks())
    }

    fn apply_settings(&self, settings: AppSettings) {
        self.context_debounce
            .set_delay(Duration::from_millis(settings.context_debounce_ms));
        let previous = {
            let mut writer = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *writer, settings.clone())
        };
        match (previous.logging_enabled, settings.logging_enabled) {
            (false, true) => self.enable_file_logging(&settings.log_level),
            (true, false) => {
                tracing::info!("file logging disabled");
                logging::set_file_logging(false);
            }
            _ => {}
        }
    }

    fn enable_file_logging(&self, level: &str) {
        let Some(data_dir) = self.db.path().and_then(Path::parent) else {
            tracing::warn!("file logging needs an on-disk database; leaving it off");
            return;
        };
        match logging::init_tracing(data_dir, level) {
            Ok(()) => tracing::info!(data_dir = %data_dir.display(), "file logging enabled"),
            Err(error) => tracing::warn!(error = %error, "file logging not installed"),
        }
    }

    fn emit(&self, event: CoreEvent) {
        let sender = self
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sender) = sender else {
            return;
        };
        if let Err(error) = sender.try_send(event) {
            tracing::warn!(error = %error, "dropping core event");
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ExplorerCore {
    fn drop(&mut self) {
        self.timers.shutdown();
    }
}

/// Read path for queries: an unreadable collection shows as empty.
fn readable<T: Default>(what: &'static str, result: AppResult<T>) -> T {
    result.unwrap_or_else(|error| {
        tracing::warn!(collection = what, error = %error, "collection unreadable; showing it as empty");
        T::default()
    })
}

fn push_unique(values: &mut Vec<String>, value: &str) -> bool {
    if values.iter().any(|existing| existing == value) {
        return false;
    }
    values.push(value.to_string());
    true
}

fn retain_changed(values: &mut Vec<String>, mut keep: impl FnMut(&str) -> bool) -> bool {
    let before = values.len();
    values.retain(|value| keep(value));
    values.len() != before
}

fn is_same_or_descendant(candidate: &str, root: &str) -> bool {
    let Some(rest) = candidate.strip_prefix(root) else {
        return false;
    };
    rest.is_empty() || root.ends_with(['/', '\\']) || rest.starts_with(['/', '\\'])
}
