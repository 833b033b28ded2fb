// RecordStore: lazily-opened keyed container of Todo records

use crate::config::StoreConfig;
use crate::db;
use crate::error::{Result, StoreError};
use crate::key::Key;
use crate::schema::Upgrade;
use crate::todo::Todo;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info};

/// Connection lifecycle of a [`RecordStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No operation has run yet
    Uninitialized,
    /// The open/upgrade sequence is in flight
    Opening,
    /// The database is open and the container exists
    Ready,
    /// Opening failed; every operation returns that error
    Failed,
}

#[derive(Clone)]
struct Opened {
    conn: Arc<Mutex<Connection>>,
    upgrade: Upgrade,
}

// Runs on its own task, so it completes even if every awaiter goes away
type Opening = Shared<BoxFuture<'static, Result<Opened>>>;

/// Persistent store for [`Todo`] records
///
/// Nothing touches the database until the first operation. That operation
/// opens and upgrades it; every other caller, concurrent or later, awaits the
/// same attempt. The open runs detached from its callers: cancelling the
/// operation that started it does not cancel or repeat the open. The outcome
/// is kept for the lifetime of the store, including a failure: a store whose
/// open failed is not re-opened.
///
/// Each operation runs in its own transaction. Concurrent writes are applied
/// one after another with no ordering guarantee between them.
pub struct RecordStore {
    config: StoreConfig,
    opening: OnceLock<Opening>,
    open_attempts: AtomicUsize,
}

impl RecordStore {
    /// Create a store; the database is opened on first use
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            opening: OnceLock::new(),
            open_attempts: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn into_config(self) -> StoreConfig {
        self.config
    }

    /// Current lifecycle state; an open counts as finished once an awaiter
    /// has observed its result
    pub fn state(&self) -> ConnectionState {
        match self.opening.get().map(Shared::peek) {
            None => ConnectionState::Uninitialized,
            Some(None) => ConnectionState::Opening,
            Some(Some(Ok(_))) => ConnectionState::Ready,
            Some(Some(Err(_))) => ConnectionState::Failed,
        }
    }

    /// How many times the open/upgrade sequence has started
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    /// Upgrade result of the completed open, if any
    pub fn last_upgrade(&self) -> Option<Upgrade> {
        match self.opening.get().and_then(Shared::peek) {
            Some(Ok(opened)) => Some(opened.upgrade),
            _ => None,
        }
    }

    // ========================================================================
    // Record operations
    // ========================================================================

    /// Insert a new record, returning its key
    ///
    /// The value is normalized to plain data first (see [`Todo::normalize`]).
    /// Fails with [`StoreError::DuplicateKey`] if the id is already stored;
    /// the stored record is left untouched.
    pub async fn add<T: Serialize + ?Sized>(&self, record: &T) -> Result<Key> {
        let todo = Todo::normalize(record)?;
        let key = todo.id().clone();
        let value = todo.to_stored()?;
        debug!(%key, "add: called");

        self.write(move |conn| {
            let inserted = conn.execute("INSERT INTO todos (id, value) VALUES (?1, ?2)", rusqlite::params![key, value]);
            match inserted {
                Ok(_) => Ok(key),
                Err(err) if is_primary_key_violation(&err) => Err(StoreError::DuplicateKey(key)),
                Err(err) => Err(StoreError::transaction(err)),
            }
        })
        .await
    }

    /// Fetch a record by key; `None` if there is no such record
    pub async fn get(&self, id: impl Into<Key>) -> Result<Option<Todo>> {
        let key = id.into();
        debug!(%key, "get: called");

        self.read(move |conn| {
            let json: Option<String> = conn
                .query_row("SELECT value FROM todos WHERE id = ?1", [&key], |row| row.get(0))
                .optional()
                .map_err(StoreError::transaction)?;

            json.map(|json| Todo::from_stored(&json)).transpose()
        })
        .await
    }

    /// All records, in key order (integers first, then strings)
    pub async fn get_all(&self) -> Result<Vec<Todo>> {
        debug!("get_all: called");

        self.read(|conn| {
            let mut stmt = conn
                .prepare("SELECT value FROM todos ORDER BY id")
                .map_err(StoreError::transaction)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(StoreError::transaction)?;

            let mut results = Vec::new();
            for row_result in rows {
                let json = row_result.map_err(StoreError::transaction)?;
                results.push(Todo::from_stored(&json)?);
            }
            Ok(results)
        })
        .await
    }

    /// Create or replace the record at the value's id, returning the key
    ///
    /// This is a full replacement, not a merge: fields missing from `record`
    /// are gone afterwards. To change one field, `get` the record, edit it and
    /// pass the whole record back.
    pub async fn update<T: Serialize + ?Sized>(&self, record: &T) -> Result<Key> {
        let todo = Todo::normalize(record)?;
        let key = todo.id().clone();
        let value = todo.to_stored()?;
        debug!(%key, "update: called");

        self.write(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO todos (id, value) VALUES (?1, ?2)",
                rusqlite::params![key, value],
            )
            .map_err(StoreError::transaction)?;
            Ok(key)
        })
        .await
    }

    /// Remove the record at `id`; succeeds whether or not it exists
    pub async fn delete(&self, id: impl Into<Key>) -> Result<()> {
        let key = id.into();

        let removed = self
            .write(move |conn| {
                conn.execute("DELETE FROM todos WHERE id = ?1", [&key])
                    .map_err(StoreError::transaction)
            })
            .await?;

        debug!(removed, "delete: done");
        Ok(())
    }

    // ========================================================================
    // Connection and transactions
    // ========================================================================

    async fn connection(&self) -> Result<Arc<Mutex<Connection>>> {
        let opening = self.opening.get_or_init(|| self.start_open()).clone();
        let opened = opening.await?;
        Ok(opened.conn)
    }

    /// Start the open/upgrade sequence; only ever called once per store
    fn start_open(&self) -> Opening {
        let attempt = self.open_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        info!(attempt, location = ?self.config.location, "Opening record store");

        let config = self.config.clone();
        tokio::task::spawn_blocking(move || db::open(&config))
            .map(|joined| -> Result<Opened> {
                let (conn, upgrade) =
                    joined.map_err(|e| StoreError::Connection(format!("open task failed: {}", e)))??;
                Ok(Opened {
                    conn: Arc::new(Mutex::new(conn)),
                    upgrade,
                })
            })
            .boxed()
            .shared()
    }

    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        self.run(TransactionBehavior::Deferred, f).await
    }

    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        self.run(TransactionBehavior::Immediate, f).await
    }

    /// Run `f` in its own transaction; it rolls back if `f` fails
    async fn run<T, F>(&self, behavior: TransactionBehavior, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.connection().await?;

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| StoreError::Transaction("connection lock poisoned".to_string()))?;
            let tx = conn
                .transaction_with_behavior(behavior)
                .map_err(StoreError::transaction)?;

            let out = f(&*tx)?;

            tx.commit().map_err(StoreError::transaction)?;
            Ok(out)
        })
        .await
        .map_err(|e| StoreError::Transaction(format!("store task failed: {}", e)))?
    }
}

fn is_primary_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
