pub mod collections;
pub mod db;
pub mod errors;
pub mod identity;
pub mod logging;
pub mod models;
pub mod navigation;
pub mod ordering;
pub mod probe;
pub mod reconciler;
pub mod service;
pub mod timers;

pub use crate::collections::{CollectionsSnapshot, KeyValueStore, PersistedCollections};
pub use crate::db::{Database, WorkspaceStore};
pub use crate::errors::{AppError, AppResult};
pub use crate::models::{
    AppSettings, Bookmark, BookmarkToggle, CoreEvent, CursorPosition, Direction, EntryKind, IdentityClass,
    LineDecorations, ListEntry, MaterializedList, OrderEntry, PathKind, Tier,
};
pub use crate::probe::{FsProbe, PathProbe, ProbeFuture};
pub use crate::service::ExplorerCore;
