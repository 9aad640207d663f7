use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const LABEL_MAX_CHARS: usize = 50;
const LABEL_TRUNCATED_CHARS: usize = 47;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    #[serde(alias = "filePath")]
    pub path: String,
    pub line: u32,
    pub character: u32,
    #[serde(default)]
    pub label: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl Bookmark {
    pub fn new(path: &str, line: u32, character: u32, line_text: &str) -> Self {
        Self {
            path: path.to_string(),
            line,
            character,
            label: default_bookmark_label(line, line_text),
            timestamp: Utc::now(),
        }
    }

    pub fn display_line(&self) -> u32 {
        self.line.saturating_add(1)
    }
}

/// Trimmed line text, cut to 47 characters plus an ellipsis when it runs past
/// 50, or `Line N` (one-based) when the line is blank.
pub fn default_bookmark_label(line: u32, line_text: &str) -> String {
    let trimmed = line_text.trim();
    if trimmed.is_empty() {
        return format!("Line {}", line.saturating_add(1));
    }
    if trimmed.chars().count() > LABEL_MAX_CHARS {
        let head = trimmed.chars().take(LABEL_TRUNCATED_CHARS).collect::<String>();
        return format!("{head}...");
    }
    trimmed.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    File,
    Folder,
    Bookmark,
}

impl EntryKind {
    pub fn class(self) -> IdentityClass {
        match self {
            Self::File | Self::Folder => IdentityClass::Path,
            Self::Bookmark => IdentityClass::Bookmark,
        }
    }
}

/// Paths and bookmarks live in separate identity namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityClass {
    Path,
    Bookmark,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEntry {
    #[serde(alias = "type")]
    pub kind: EntryKind,
    pub id: String,
}

impl OrderEntry {
    pub fn new(kind: EntryKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn key(&self) -> (IdentityClass, &str) {
        (self.kind.class(), self.id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Top,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Directory,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ListEntry {
    Path {
        path: String,
        kind: EntryKind,
        tier: Tier,
    },
    Bookmark {
        id: String,
        record: Bookmark,
        tier: Tier,
    },
}

impl ListEntry {
    pub fn id(&self) -> &str {
        match self {
            Self::Path { path, .. } => path,
            Self::Bookmark { id, .. } => id,
        }
    }

    pub fn class(&self) -> IdentityClass {
        match self {
            Self::Path { .. } => IdentityClass::Path,
            Self::Bookmark { .. } => IdentityClass::Bookmark,
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            Self::Path { tier, .. } | Self::Bookmark { tier, .. } => *tier,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedList {
    pub top: Vec<ListEntry>,
    pub normal: Vec<ListEntry>,
}

impl MaterializedList {
    pub fn iter(&self) -> impl Iterator<Item = &ListEntry> {
        self.top.iter().chain(self.normal.iter())
    }

    pub fn top_ids(&self) -> Vec<&str> {
        self.top.iter().map(ListEntry::id).collect()
    }

    pub fn normal_ids(&self) -> Vec<&str> {
        self.normal.iter().map(ListEntry::id).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPosition {
    pub path: String,
    pub line: u32,
    pub character: u32,
}

impl CursorPosition {
    pub fn new(path: impl Into<String>, line: u32, character: u32) -> Self {
        Self {
            path: path.into(),
            line,
            character,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookmarkToggle {
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDecoration {
    pub line: u32,
    pub hover: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDecorations {
    pub path: Option<String>,
    pub active: Vec<LineDecoration>,
    pub normal: Vec<LineDecoration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CoreEvent {
    ListChanged,
    PinContext { path: Option<String>, is_pinned: bool },
    Decorations(LineDecorations),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub logging_enabled: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_context_debounce_ms")]
    pub context_debounce_ms: u64,
    #[serde(default = "default_file_deletion_delay_ms")]
    pub file_deletion_delay_ms: u64,
    #[serde(default = "default_true")]
    pub prune_missing_on_reconcile: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            logging_enabled: false,
            log_level: default_log_level(),
            context_debounce_ms: default_context_debounce_ms(),
            file_deletion_delay_ms: default_file_deletion_delay_ms(),
            prune_missing_on_reconcile: true,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_context_debounce_ms() -> u64 {
    150
}

fn default_file_deletion_delay_ms() -> u64 {
    100
}

fn default_true() -> bool {
    true
}
