//! SQLite block store utilities.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so readers never wait on the single writer
//! - `busy_timeout = 5s` bounds how long a write waits for the lock
//! - `foreign_keys = ON` keeps owned rows attached to their block

pub mod migrations;
pub mod query;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

/// Busy timeout used when the config does not set one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the block store, apply runtime pragmas, and migrate the
/// schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening, configuring or migrating the database fails.
pub fn open_store(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create store directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open block store {}", path.display()))?;

    configure_connection(&conn, busy_timeout).context("configure sqlite pragmas")?;
    let version = migrations::migrate(&mut conn).context("apply store migrations")?;
    tracing::debug!(path = %path.display(), schema_version = version, "opened block store");

    Ok(conn)
}

/// Open a store only if its file already exists.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be opened or migrated.
pub fn open_existing_store(path: &Path, busy_timeout: Duration) -> Result<Option<Connection>> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "block store file missing");
        return Ok(None);
    }
    open_store(path, busy_timeout).map(Some)
}

/// A migrated in-memory store. Every call returns an independent database.
///
/// # Errors
///
/// Returns an error if configuring or migrating the database fails.
pub fn open_in_memory() -> rusqlite::Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    migrations::migrate(&mut conn)?;
    Ok(conn)
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, open_existing_store, open_store};
    use crate::db::migrations;
    use std::time::Duration;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(".quire").join("quire.db");
        (dir, path)
    }

    #[test]
    fn open_store_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let conn = open_store(&path, DEFAULT_BUSY_TIMEOUT).expect("open store");

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(
            u128::from(busy_timeout_ms),
            DEFAULT_BUSY_TIMEOUT.as_millis()
        );

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn open_store_honours_custom_busy_timeout() {
        let (_dir, path) = temp_db_path();
        let conn = open_store(&path, Duration::from_millis(250)).expect("open store");
        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(busy_timeout_ms, 250);
    }

    #[test]
    fn open_store_runs_migrations() {
        let (_dir, path) = temp_db_path();
        let conn = open_store(&path, DEFAULT_BUSY_TIMEOUT).expect("open store");

        let version = migrations::current_schema_version(&conn).expect("schema version query");
        assert_eq!(version, migrations::LATEST_SCHEMA_VERSION);

        let stored: i64 = conn
            .query_row(
                "SELECT schema_version FROM store_meta WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .expect("store_meta schema version");
        assert_eq!(stored, i64::from(migrations::LATEST_SCHEMA_VERSION));
    }

    #[test]
    fn open_existing_store_skips_missing_file() {
        let (_dir, path) = temp_db_path();
        let result = open_existing_store(&path, DEFAULT_BUSY_TIMEOUT).expect("no io error");
        assert!(result.is_none());
        assert!(!path.exists());
    }
}
