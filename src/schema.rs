// Versioned schema: one container, created on the first upgrade

use crate::error::{Result, StoreError};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

/// Schema version stamped into `PRAGMA user_version`
pub const SCHEMA_VERSION: u32 = 1;

/// Name of the single keyed container
pub const CONTAINER: &str = "todos";

/// Outcome of bringing a database up to [`SCHEMA_VERSION`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upgrade {
    /// The container did not exist and was created
    Created,
    /// Nothing to do, or the container already existed
    AlreadyCurrent,
}

/// Bring the database to [`SCHEMA_VERSION`]
///
/// The upgrade step only runs for a database stamped below the current
/// version. It creates the container when absent, then stamps the version, in
/// one transaction. A database stamped with a newer version is a version
/// conflict.
pub(crate) fn upgrade(conn: &mut Connection) -> Result<Upgrade> {
    let current = user_version(conn)?;

    if current > SCHEMA_VERSION {
        return Err(StoreError::Connection(format!(
            "database version {} is newer than supported version {}",
            current, SCHEMA_VERSION
        )));
    }

    if current == SCHEMA_VERSION {
        debug!(version = current, "upgrade: schema already current");
        return Ok(Upgrade::AlreadyCurrent);
    }

    info!(from = current, to = SCHEMA_VERSION, "Upgrading database schema");

    let tx = conn.transaction().map_err(StoreError::connection)?;

    let outcome = if container_exists(&tx)? {
        Upgrade::AlreadyCurrent
    } else {
        // No declared type on id: integer and text keys keep their storage
        // class, so ORDER BY id puts integers before text.
        tx.execute_batch(
            r#"
            CREATE TABLE todos (
                id NOT NULL PRIMARY KEY,
                value TEXT NOT NULL
            ) WITHOUT ROWID;
            "#,
        )
        .map_err(StoreError::connection)?;
        Upgrade::Created
    };

    tx.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))
        .map_err(StoreError::connection)?;
    tx.commit().map_err(StoreError::connection)?;

    info!(?outcome, container = CONTAINER, "Schema upgrade complete");
    Ok(outcome)
}

pub(crate) fn user_version(conn: &Connection) -> Result<u32> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))
        .map_err(StoreError::connection)
}

pub(crate) fn container_exists(conn: &Connection) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [CONTAINER],
            |row| row.get(0),
        )
        .optional()
        .map_err(StoreError::connection)?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_creates_container_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(user_version(&conn).unwrap(), 0);
        assert!(!container_exists(&conn).unwrap());

        assert_eq!(upgrade(&mut conn).unwrap(), Upgrade::Created);
        assert_eq!(user_version(&conn).unwrap(), SCHEMA_VERSION);
        assert!(container_exists(&conn).unwrap());

        assert_eq!(upgrade(&mut conn).unwrap(), Upgrade::AlreadyCurrent);
    }

    #[test]
    fn test_upgrade_keeps_existing_container() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE todos (id NOT NULL PRIMARY KEY, value TEXT NOT NULL) WITHOUT ROWID;")
            .unwrap();
        conn.execute("INSERT INTO todos (id, value) VALUES (1, '{\"id\":1}')", [])
            .unwrap();

        assert_eq!(upgrade(&mut conn).unwrap(), Upgrade::AlreadyCurrent);
        assert_eq!(user_version(&conn).unwrap(), SCHEMA_VERSION);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM todos", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_upgrade_rejects_newer_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 2;").unwrap();

        let err = upgrade(&mut conn).unwrap_err();
        assert!(matches!(err, StoreError::Connection(ref msg) if msg.contains("newer")));
    }
}
