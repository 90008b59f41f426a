//! Durable, ordered entry store.
//!
//! Entries live in a single SQLite table. Every append runs in its own
//! transaction, so a row is either fully visible to later reads or absent.
//! Ordering is `created_at DESC, seq DESC`: newest first, and among equal
//! timestamps the most recently inserted first.

pub mod config;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{Entry, EntryId};

pub use config::{default_data_dir, StoreConfig};

/// Errors that can occur in store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Bad input. Not retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Storage could not be reached or failed. Safe to retry.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the caller may retry the same request.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

const ENTRY_COLUMNS: &str = "id, image_ref, caption, created_at";

/// SQLite-backed entry store.
pub struct EntryStore {
    conn: Connection,
}

impl EntryStore {
    /// Open (or create) the store in `config.data_dir`.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let db_path = config.db_path();
        let conn = Connection::open(&db_path)?;
        let store = Self::with_connection(conn)?;

        info!(path = %db_path.display(), "Entry store opened");

        Ok(store)
    }

    /// Open a throwaway store that lives only as long as the value.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entries (
                 seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                 id          TEXT NOT NULL UNIQUE,
                 image_ref   TEXT NOT NULL,
                 caption     TEXT,
                 created_at  INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_entries_created_at
                 ON entries(created_at DESC, seq DESC);",
        )?;
        Ok(())
    }

    /// Append a new entry stamped with the current time.
    pub fn append(&mut self, image_ref: &str, caption: Option<&str>) -> Result<Entry> {
        self.append_at(image_ref, caption, Utc::now())
    }

    /// Append with an explicit clock reading.
    ///
    /// The stored timestamp is `max(now, newest stored timestamp)`, so
    /// `created_at` never decreases in insertion order.
    pub(crate) fn append_at(
        &mut self,
        image_ref: &str,
        caption: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Entry> {
        if image_ref.trim().is_empty() {
            return Err(StoreError::Validation("imageRef is required".to_string()));
        }

        let tx = self.conn.transaction()?;

        let newest: Option<i64> =
            tx.query_row("SELECT MAX(created_at) FROM entries", [], |row| row.get(0))?;
        let micros = newest.map_or(now.timestamp_micros(), |n| n.max(now.timestamp_micros()));
        let created_at = micros_to_datetime(micros)?;

        let id = EntryId::generate();
        tx.execute(
            "INSERT INTO entries (id, image_ref, caption, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id.to_string(), image_ref, caption, micros],
        )?;
        tx.commit()?;

        debug!(entry_id = %id, image_ref = %image_ref, "Appended entry");

        Ok(Entry {
            id,
            image_ref: image_ref.to_string(),
            caption: caption.map(str::to_string),
            created_at,
        })
    }

    /// All entries, newest first.
    pub fn list(&self) -> Result<Vec<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries ORDER BY created_at DESC, seq DESC"
        ))?;

        let rows = stmt.query_map([], entry_from_row)?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }

        Ok(entries)
    }

    /// Look up a single entry.
    pub fn get(&self, id: &EntryId) -> Result<Option<Entry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
                [id.to_string()],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Number of stored entries.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let id: String = row.get(0)?;
    let id = id.parse::<EntryId>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let micros: i64 = row.get(3)?;
    let created_at = DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(3, micros))?;

    Ok(Entry {
        id,
        image_ref: row.get(1)?,
        caption: row.get(2)?,
        created_at,
    })
}

fn micros_to_datetime(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::Unavailable(format!("timestamp out of range: {micros}")))
}

/// Async handle to a store shared between request handlers.
///
/// SQLite calls run on the blocking pool so a slow disk never stalls the
/// runtime. The mutex serializes writers: two concurrent appends never
/// interleave.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<EntryStore>>,
}

impl SharedStore {
    pub fn new(store: EntryStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub async fn append(&self, image_ref: &str, caption: Option<&str>) -> Result<Entry> {
        let image_ref = image_ref.to_string();
        let caption = caption.map(str::to_string);
        self.with_store(move |store| store.append(&image_ref, caption.as_deref()))
            .await
    }

    pub async fn list(&self) -> Result<Vec<Entry>> {
        self.with_store(|store| store.list()).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.with_store(|store| store.count()).await
    }

    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut EntryStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut store = inner
                .lock()
                .map_err(|_| StoreError::Unavailable("entry store lock poisoned".to_string()))?;
            op(&mut store)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
    }
}
