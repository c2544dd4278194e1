//! Progress persistence, keyed by puzzle date.
//!
//! Two layers: a [`KvBackend`] that only knows string keys and values, and a
//! [`ProgressStore`] that maps a day's [`PersistedState`] onto three
//! namespaced keys:
//!
//! - `solved:<date>`: JSON array of solved group names, in solve order
//! - `status:<date>`: `"won"` or `"lost"`, absent while playing
//! - `wrongAttempts:<date>`: JSON integer
//!
//! The store swallows its own failures. Unreadable or malformed values load as
//! "no progress" and failed writes are logged, so a broken store can never
//! wedge a game.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistedStatus {
    Won,
    Lost,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub solved_group_names: Vec<String>,
    pub wrong_attempts: u32,
    pub status: Option<PersistedStatus>,
}

pub fn solved_key(date: NaiveDate) -> String {
    format!("solved:{date}")
}

pub fn status_key(date: NaiveDate) -> String {
    format!("status:{date}")
}

pub fn wrong_attempts_key(date: NaiveDate) -> String {
    format!("wrongAttempts:{date}")
}

/// String key-value storage.
pub trait KvBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Durable backend: one `progress` table in a SQLite file.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS progress (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
    ";

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(Duration::from_millis(60000))?;
        Self::initialize(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(Self::SCHEMA)?;
        Ok(Self { conn })
    }

    /// Drops every progress key of the given days in one transaction.
    pub fn clear_dates(&mut self, dates: &[NaiveDate]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM progress WHERE key = ?1")?;
            for &date in dates {
                for key in [solved_key(date), status_key(date), wrong_attempts_key(date)] {
                    removed += stmt.execute(params![key])?;
                }
            }
        }
        tx.commit()?;
        Ok(removed)
    }
}

impl KvBackend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM progress WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO progress (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM progress WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Per-day progress persistence as seen by a game session.
pub trait ProgressStore {
    fn load(&self, date: NaiveDate) -> Option<PersistedState>;
    fn save(&mut self, date: NaiveDate, state: &PersistedState);
    fn clear(&mut self, date: NaiveDate);
}

impl<P: ProgressStore + ?Sized> ProgressStore for Box<P> {
    fn load(&self, date: NaiveDate) -> Option<PersistedState> {
        (**self).load(date)
    }

    fn save(&mut self, date: NaiveDate, state: &PersistedState) {
        (**self).save(date, state);
    }

    fn clear(&mut self, date: NaiveDate) {
        (**self).clear(date);
    }
}

#[derive(Debug, Default, Clone)]
pub struct KvProgressStore<B> {
    backend: B,
}

impl<B: KvBackend> KvProgressStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    fn read<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>, String> {
        match self.backend.get(key) {
            Ok(Some(raw)) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| format!("{key}: {e}")),
            Ok(None) => Ok(None),
            Err(e) => Err(format!("{key}: {e}")),
        }
    }

    fn try_load(&self, date: NaiveDate) -> Result<Option<PersistedState>, String> {
        let solved: Option<Vec<String>> = self.read(&solved_key(date))?;
        let status: Option<PersistedStatus> = self.read(&status_key(date))?;
        let attempts: Option<u32> = self.read(&wrong_attempts_key(date))?;

        if solved.is_none() && status.is_none() && attempts.is_none() {
            return Ok(None);
        }
        Ok(Some(PersistedState {
            solved_group_names: solved.unwrap_or_default(),
            wrong_attempts: attempts.unwrap_or(0),
            status,
        }))
    }

    fn try_save(&mut self, date: NaiveDate, state: &PersistedState) -> Result<(), StoreError> {
        // Vec<String>, u32 and a unit enum always serialize.
        let solved = serde_json::to_string(&state.solved_group_names).unwrap_or_default();
        self.backend.set(&solved_key(date), &solved)?;
        self.backend
            .set(&wrong_attempts_key(date), &state.wrong_attempts.to_string())?;
        match state.status {
            Some(status) => {
                let status = serde_json::to_string(&status).unwrap_or_default();
                self.backend.set(&status_key(date), &status)?;
            }
            None => self.backend.remove(&status_key(date))?,
        }
        Ok(())
    }

    fn try_clear(&mut self, date: NaiveDate) -> Result<(), StoreError> {
        self.backend.remove(&solved_key(date))?;
        self.backend.remove(&status_key(date))?;
        self.backend.remove(&wrong_attempts_key(date))?;
        Ok(())
    }
}

impl<B: KvBackend> ProgressStore for KvProgressStore<B> {
    fn load(&self, date: NaiveDate) -> Option<PersistedState> {
        match self.try_load(date) {
            Ok(state) => state,
            Err(reason) => {
                tracing::warn!(%date, %reason, "Ignoring unreadable saved progress");
                None
            }
        }
    }

    fn save(&mut self, date: NaiveDate, state: &PersistedState) {
        if let Err(e) = self.try_save(date, state) {
            tracing::warn!(%date, %e, "Failed to save progress");
        }
    }

    fn clear(&mut self, date: NaiveDate) {
        if let Err(e) = self.try_clear(date) {
            tracing::warn!(%date, %e, "Failed to clear progress");
        }
    }
}

pub type MemoryProgressStore = KvProgressStore<MemoryBackend>;
pub type SqliteProgressStore = KvProgressStore<SqliteBackend>;

impl SqliteProgressStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        SqliteBackend::open(path).map(Self::new)
    }
}
