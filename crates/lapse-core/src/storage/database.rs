//! SQLite-backed durable state store.
//!
//! Holds the timer record, the settings record and the floating indicator
//! position in a partitioned key-value table at
//! `~/.config/lapse/lapse.db`.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;

use super::{data_dir, migrations, Partition, StateStore, StoreChange, CHANGE_CHANNEL_CAPACITY};
use crate::error::{CoreError, StoreError};

/// SQLite database for durable state.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    changes: broadcast::Sender<StoreChange>,
}

impl Database {
    /// Open the database at `~/.config/lapse/lapse.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable or the
    /// database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("lapse.db");
        Ok(Self::open_at(path)?)
    }

    /// Open (or create) the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        // Another engine process may hold the write lock briefly.
        conn.busy_timeout(std::time::Duration::from_millis(250))?;
        Self::init(conn, Some(path))
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, StoreError> {
        migrations::migrate(&conn)?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            changes,
        })
    }

    /// File backing this database, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn announce(&self, partition: Partition, key: &str) {
        // No subscribers is not an error.
        self.changes
            .send(StoreChange {
                partition,
                key: key.to_string(),
            })
            .ok();
    }

    /// All keys in a partition, sorted.
    pub fn keys(&self, partition: Partition) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv WHERE partition = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![partition.as_str()], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for key in rows {
            keys.push(key?);
        }
        Ok(keys)
    }
}

impl StateStore for Database {
    fn get(&self, partition: Partition, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv WHERE partition = ?1 AND key = ?2",
                params![partition.as_str(), key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, partition: Partition, key: &str, value: &str) -> Result<(), StoreError> {
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO kv (partition, key, value, updated_at)
                 VALUES (?1, ?2, ?3, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                 ON CONFLICT(partition, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![partition.as_str(), key, value],
            )?;
        }
        self.announce(partition, key);
        Ok(())
    }

    fn remove(&self, partition: Partition, key: &str) -> Result<(), StoreError> {
        let removed = {
            let conn = self.conn()?;
            conn.execute(
                "DELETE FROM kv WHERE partition = ?1 AND key = ?2",
                params![partition.as_str(), key],
            )?
        };
        if removed > 0 {
            self.announce(partition, key);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
