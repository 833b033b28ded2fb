// Opening the underlying database

use crate::config::{Location, StoreConfig, validate_db_name};
use crate::error::{Result, StoreError};
use crate::schema::{self, Upgrade};
use rusqlite::Connection;
use std::fs;
use std::time::Instant;
use tracing::{info, warn};

/// Open the configured database and upgrade it to the current schema
///
/// Blocking; callers run it off the async executor.
pub(crate) fn open(config: &StoreConfig) -> Result<(Connection, Upgrade)> {
    let started_at = Instant::now();

    let result = open_connection(config).and_then(|mut conn| {
        conn.busy_timeout(config.busy_timeout)
            .map_err(StoreError::connection)?;
        let upgrade = schema::upgrade(&mut conn)?;
        Ok((conn, upgrade))
    });

    match &result {
        Ok((_, upgrade)) => info!(
            db_name = %config.db_name,
            ?upgrade,
            duration_ms = started_at.elapsed().as_millis() as u64,
            "Database opened"
        ),
        Err(err) => warn!(
            db_name = %config.db_name,
            error = %err,
            duration_ms = started_at.elapsed().as_millis() as u64,
            "Failed to open database"
        ),
    }

    result
}

fn open_connection(config: &StoreConfig) -> Result<Connection> {
    match &config.location {
        Location::InMemory => Connection::open_in_memory().map_err(StoreError::connection),
        Location::Directory(_) => {
            validate_db_name(&config.db_name)?;

            let (Some(dir), Some(db_path)) = (config.store_dir(), config.db_path()) else {
                return Err(StoreError::Connection("store has no database path".to_string()));
            };

            fs::create_dir_all(&dir).map_err(|e| {
                StoreError::Connection(format!("failed to create store directory {}: {}", dir.display(), e))
            })?;

            Connection::open(&db_path).map_err(|e| {
                StoreError::Connection(format!("failed to open {}: {}", db_path.display(), e))
            })
        }
    }
}
