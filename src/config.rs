// Store location and engine settings

use crate::error::{Result, StoreError};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Database name used when none is configured
pub const DEFAULT_DB_NAME: &str = "MyCacheDB";

/// Subdirectory created inside the configured directory
pub const STORE_DIR: &str = ".todostore";

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// `<dir>/.todostore/<db_name>.db`
    Directory(PathBuf),
    /// Private in-memory database, gone when the store is dropped
    InMemory,
}

/// Settings used when the store first opens its database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub location: Location,
    pub db_name: String,
    /// How long the engine waits on a locked database before failing
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn in_directory<P: AsRef<Path>>(path: P) -> Self {
        Self {
            location: Location::Directory(path.as_ref().to_path_buf()),
            db_name: DEFAULT_DB_NAME.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            location: Location::InMemory,
            db_name: DEFAULT_DB_NAME.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_db_name(mut self, name: impl Into<String>) -> Self {
        self.db_name = name.into();
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Directory holding the database file, if file-backed
    pub fn store_dir(&self) -> Option<PathBuf> {
        match &self.location {
            Location::Directory(dir) => Some(dir.join(STORE_DIR)),
            Location::InMemory => None,
        }
    }

    /// Full path of the database file, if file-backed
    pub fn db_path(&self) -> Option<PathBuf> {
        self.store_dir().map(|dir| dir.join(format!("{}.db", self.db_name)))
    }
}

/// Check that a database name is a plain file stem
///
/// The name becomes `<name>.db` inside the store directory, so it must not be
/// empty, `.`/`..`, or contain path separators or NUL.
pub fn validate_db_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StoreError::Connection("database name cannot be empty".to_string()));
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(StoreError::Connection(format!(
            "invalid database name: {:?} (must not contain path separators)",
            name
        )));
    }
    Ok(())
}

/// File-backed store under the user's local data directory, or the current
/// directory when there is none
impl Default for StoreConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .map(|dir| dir.join("todostore"))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::in_directory(base)
    }
}
