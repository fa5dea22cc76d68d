//! Database migration system.
//!
//! Schema version stored in `PRAGMA user_version`. Migrations are forward-only.

use rusqlite::Connection;

use crate::{schema, DbError, Result, SCHEMA_VERSION};

/// Run all pending migrations on the documents database.
pub fn run(conn: &Connection) -> Result<()> {
    run_with(conn, schema::SCHEMA_V1, SCHEMA_VERSION, run_migration)
}

/// Run all pending migrations on the key vault database.
pub fn run_vault(conn: &Connection) -> Result<()> {
    run_with(conn, schema::VAULT_SCHEMA_V1, crate::vault::VAULT_SCHEMA_VERSION, |_, version| {
        Err(DbError::Migration(format!(
            "Unknown vault migration version: {version}"
        )))
    })
}

fn run_with(
    conn: &Connection,
    initial_schema: &str,
    target_version: u32,
    migrate: impl Fn(&Connection, u32) -> Result<()>,
) -> Result<()> {
    let current_version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(DbError::Sqlite)?;

    if current_version == 0 {
        // Fresh database: apply initial schema
        tracing::info!("Initializing database schema v{target_version}");
        conn.execute_batch(initial_schema)
            .map_err(DbError::Sqlite)?;

        conn.pragma_update(None, "user_version", target_version)
            .map_err(DbError::Sqlite)?;
    } else if current_version < target_version {
        for version in (current_version + 1)..=target_version {
            tracing::info!("Running migration to v{version}");
            migrate(conn, version)?;
            conn.pragma_update(None, "user_version", version)
                .map_err(DbError::Sqlite)?;
        }
    } else if current_version > target_version {
        return Err(DbError::Migration(format!(
            "Database version {current_version} is newer than supported {target_version}"
        )));
    }

    Ok(())
}

/// Run a specific documents migration.
fn run_migration(_conn: &Connection, version: u32) -> Result<()> {
    match version {
        // Future migrations go here:
        // 2 => migration_v2(conn),
        _ => Err(DbError::Migration(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_migration() {
        let conn = Connection::open_in_memory().expect("open");
        run(&conn).expect("migrate");

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_idempotent_migration() {
        let conn = Connection::open_in_memory().expect("open");
        run(&conn).expect("first run");
        run(&conn).expect("second run should be no-op");
    }

    #[test]
    fn test_newer_version_rejected() {
        let conn = Connection::open_in_memory().expect("open");
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .expect("set version");
        assert!(matches!(run(&conn), Err(DbError::Migration(_))));
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().expect("open");
        run(&conn).expect("migrate");

        for (kind, name) in [
            ("table", "documents"),
            ("index", "idx_documents_anchor"),
            ("index", "idx_documents_status"),
            ("trigger", "documents_content_hash_immutable"),
            ("trigger", "documents_status_forward_only"),
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
                    [kind, name],
                    |row| row.get(0),
                )
                .unwrap_or_else(|_| panic!("{kind} {name} check"));
            assert_eq!(count, 1, "{kind} '{name}' should exist");
        }
    }

    #[test]
    fn test_vault_schema() {
        let conn = Connection::open_in_memory().expect("open");
        run_vault(&conn).expect("migrate vault");
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='document_keys'",
                [],
                |row| row.get(0),
            )
            .expect("query");
        assert_eq!(count, 1);

        let docs: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='documents'",
                [],
                |row| row.get(0),
            )
            .expect("query");
        assert_eq!(docs, 0, "vault must not carry the documents table");
    }
}
