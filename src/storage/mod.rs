//! Key/value persistence for the session store
//!
//! The session store writes whole JSON documents under fixed keys, the same
//! way a browser's local storage is used. Two backends implement the port:
//! an SQLite file for the terminal client and an in-memory map for tests.

use crate::error::{Result, StudySphereError};
use anyhow::Context;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Persistence port used by the session store
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value; removing a missing key is not an error
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// SQLite-backed key/value store
pub struct SqliteStorage {
    db_path: PathBuf,
}

fn storage_err(e: anyhow::Error) -> StudySphereError {
    StudySphereError::Storage(format!("{:#}", e))
}

impl SqliteStorage {
    /// Create a storage instance in the platform data directory
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be determined or created
    pub fn new() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("app", "studysphere", "studysphere")
            .ok_or_else(|| StudySphereError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(storage_err)?;

        Self::new_with_path(data_dir.join("sessions.db"))
    }

    /// Create a storage instance at a specific database path
    ///
    /// # Examples
    ///
    /// ```
    /// use studysphere::storage::{KeyValueStore, SqliteStorage};
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("s.db")).unwrap();
    /// storage.set_item("k", "v").unwrap();
    /// assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(storage_err)?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Open the configured path, or the platform default when unset
    pub fn open(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::new_with_path(p.clone()),
            None => Self::new(),
        }
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(storage_err)?)
    }

    fn init(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create tables")
        .map_err(storage_err)?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let conn = self.connect()?;
        let value = conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("Failed to read item")
            .map_err(storage_err)?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.connect()?;
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO local_storage (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )
        .context("Failed to write item")
        .map_err(storage_err)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM local_storage WHERE key = ?", params![key])
            .context("Failed to remove item")
            .map_err(storage_err)?;
        Ok(())
    }
}

/// In-memory key/value store
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StudySphereError {
    StudySphereError::Storage("memory storage lock poisoned".to_string())
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.read().map_err(poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.write().map_err(poisoned)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.write().map_err(poisoned)?;
        items.remove(key);
        Ok(())
    }
}
