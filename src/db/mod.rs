use crate::collections::KeyValueStore;
use crate::errors::{AppError, AppResult};
use crate::models::AppSettings;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const SCHEMA_SQL: &str = include_str!("schema.sql");
const SETTINGS_KEY: &str = "app";

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::from)?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> AppResult<Self> {
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;
        let db = Self {
            conn: Mutex::new(conn),
            db_path,
        };
        db.ensure_default_settings()?;
        Ok(db)
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    pub fn get_state(&self, scope: &str, key: &str) -> AppResult<Option<serde_json::Value>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM workspace_state WHERE scope = ?1 AND key = ?2",
                params![scope, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put_state(&self, scope: &str, key: &str, value: &serde_json::Value) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO workspace_state (scope, key, value_json, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(scope, key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![scope, key, serde_json::to_string(value)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete_state(&self, scope: &str, key: &str) -> AppResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM workspace_state WHERE scope = ?1 AND key = ?2",
            params![scope, key],
        )?;
        Ok(removed > 0)
    }

    pub fn get_settings(&self) -> AppResult<AppSettings> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?1",
                [SETTINGS_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str::<AppSettings>(&raw).unwrap_or_default()),
            None => Ok(AppSettings::default()),
        }
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        let current = self.get_settings()?;
        let mut merged = serde_json::to_value(current)?;
        merge_json(&mut merged, update);
        let settings: AppSettings = serde_json::from_value(merged)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
            params![SETTINGS_KEY, serde_json::to_string(&settings)?, Utc::now().to_rfc3339()],
        )?;

        Ok(settings)
    }

    fn ensure_default_settings(&self) -> AppResult<()> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(1) FROM settings WHERE key = ?1",
            [SETTINGS_KEY],
            |row| row.get(0),
        )?;
        if count == 0 {
            conn.execute(
                "INSERT INTO settings (key, value_json, updated_at) VALUES (?1, ?2, ?3)",
                params![
                    SETTINGS_KEY,
                    serde_json::to_string(&AppSettings::default())?,
                    Utc::now().to_rfc3339()
                ],
            )?;
        }
        Ok(())
    }
}

/// Key-value state for one workspace, backed by the shared database.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    db: Arc<Database>,
    scope: String,
}

impl WorkspaceStore {
    pub fn new(db: Arc<Database>, scope: impl Into<String>) -> Self {
        Self {
            db,
            scope: scope.into(),
        }
    }
}

impl KeyValueStore for WorkspaceStore {
    fn get_value(&self, key: &str) -> AppResult<Option<serde_json::Value>> {
        self.db.get_state(&self.scope, key)
    }

    fn update_value(&self, key: &str, value: serde_json::Value) -> AppResult<()> {
        if value.is_null() {
            self.db.delete_state(&self.scope, key)?;
            return Ok(());
        }
        self.db.put_state(&self.scope, key, &value)
    }
}

fn merge_json(target: &mut serde_json::Value, update: serde_json::Value) {
    match (target, update) {
        (serde_json::Value::Object(target_map), serde_json::Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_json(target_map.entry(key).or_insert(serde_json::Value::Null), value);
            }
        }
        (target, update) => {
            *target = update;
        }
    }
}
