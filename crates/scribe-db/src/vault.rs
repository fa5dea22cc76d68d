//! Key vault: out-of-band custody for document encryption keys.
//!
//! Keys live in their own SQLite file so that access to the documents
//! database (and its storage references) never implies access to keys.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use scribe_types::DocumentId;

use crate::Result;

/// Vault schema version.
pub const VAULT_SCHEMA_VERSION: u32 = 1;

/// Open or create a key vault at the given path.
pub fn open(path: &Path) -> Result<Connection> {
    crate::prepare(Connection::open(path)?, crate::Store::Vault)
}

/// Open an in-memory vault (for testing).
pub fn open_memory() -> Result<Connection> {
    crate::prepare(Connection::open_in_memory()?, crate::Store::Vault)
}

/// Store the key for a document. A document's key is written once.
pub fn store_key(conn: &Connection, document_id: &DocumentId, key_hex: &str, stored_at: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO document_keys (document_id, key_hex, stored_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![document_id.to_string(), key_hex, stored_at as i64],
    )?;
    Ok(())
}

/// Load the key for a document, if the vault holds one.
pub fn load_key(conn: &Connection, document_id: &DocumentId) -> Result<Option<String>> {
    let key = conn
        .query_row(
            "SELECT key_hex FROM document_keys WHERE document_id = ?1",
            [document_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(key)
}

/// Remove a document's key. Used to roll back a vault write whose document
/// row was never created.
pub fn delete_key(conn: &Connection, document_id: &DocumentId) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM document_keys WHERE document_id = ?1",
        [document_id.to_string()],
    )?;
    Ok(removed > 0)
}
