//! # scribe-db
//!
//! SQLite persistence for the document pipeline.
//!
//! Two files live under the data directory:
//! - `scribe.db`: the `documents` table (one row per ingested file, status
//!   transitions guarded by triggers)
//! - `keys.db`: the key vault, only opened when vault custody is enabled
//!   (see [`vault`])
//!
//! Timestamps are Unix epoch seconds. Schema versions are tracked in
//! `PRAGMA user_version` and migrated forward only.

pub mod migrations;
pub mod queries;
pub mod schema;
pub mod vault;

use std::path::Path;

use rusqlite::Connection;

/// Current documents schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Milliseconds a writer waits on a locked database before failing.
pub const BUSY_TIMEOUT_MS: u32 = 5000;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A document with this content hash already exists.
    #[error("duplicate content hash: {0}")]
    DuplicateContentHash(String),

    /// A trigger refused the write (immutable column, backwards status move).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A stored column could not be decoded into its domain type.
    #[error("corrupt row: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Which database a connection serves. Decides pragmas and schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Store {
    Documents,
    Vault,
}

/// Open or create the documents database, migrating it to [`SCHEMA_VERSION`].
pub fn open(path: &Path) -> Result<Connection> {
    prepare(Connection::open(path)?, Store::Documents)
}

/// In-memory documents database for tests.
pub fn open_memory() -> Result<Connection> {
    prepare(Connection::open_in_memory()?, Store::Documents)
}

fn prepare(conn: Connection, store: Store) -> Result<Connection> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};
         PRAGMA synchronous = NORMAL;"
    ))?;
    match store {
        Store::Documents => {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            migrations::run(&conn)?;
        }
        Store::Vault => {
            // Overwrite deleted key pages instead of leaving them in free pages.
            conn.execute_batch("PRAGMA secure_delete = ON;")?;
            migrations::run_vault(&conn)?;
        }
    }
    Ok(conn)
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("scribe-db-{}-{name}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_open_memory_is_migrated() {
        let conn = open_memory().expect("open in-memory db");
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("get user_version");
        assert_eq!(version, SCHEMA_VERSION);

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .expect("documents table");
        assert_eq!(rows, 0);
    }

    #[test]
    fn test_file_database_uses_wal_and_survives_reopen() {
        let path = scratch_path("scribe.db");
        {
            let conn = open(&path).expect("create");
            let mode: String = conn
                .pragma_query_value(None, "journal_mode", |row| row.get(0))
                .expect("journal_mode");
            assert_eq!(mode.to_lowercase(), "wal");
        }
        let conn = open(&path).expect("reopen");
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("user_version");
        assert_eq!(version, SCHEMA_VERSION);

        drop(conn);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[test]
    fn test_pragmas() {
        let conn = open_memory().expect("open");
        let fk: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("get foreign_keys");
        assert_eq!(fk, 1);

        let timeout: u32 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("get busy_timeout");
        assert_eq!(timeout, BUSY_TIMEOUT_MS);
    }

    #[test]
    fn test_unix_now_is_recent() {
        // 2023-11-14
        assert!(unix_now() > 1_700_000_000);
    }
}
