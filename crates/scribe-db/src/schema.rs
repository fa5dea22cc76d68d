//! SQL schema definitions.

/// Documents schema, v1.
///
/// Lifecycle invariants are enforced here as well as in the query layer:
/// `anchor_id` is present exactly when the status has left `unsubmitted`,
/// `content_hash` and `metadata_envelope` never change, and status updates
/// may only move forward.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    category TEXT NOT NULL,
    tags TEXT NOT NULL,
    author_identity TEXT NOT NULL,
    anonymous INTEGER NOT NULL DEFAULT 0,
    file_name TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    mime_type TEXT NOT NULL,
    content_hash TEXT NOT NULL UNIQUE,
    storage_ref TEXT,
    cipher_iv TEXT,
    cipher_auth_tag TEXT,
    anchor_id TEXT,
    anchor_status TEXT NOT NULL DEFAULT 'unsubmitted'
        CHECK (anchor_status IN ('unsubmitted', 'pending', 'confirmed', 'failed')),
    txid TEXT,
    anchor_height INTEGER,
    metadata_envelope TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    reconcile_exhausted_at INTEGER,
    CHECK ((anchor_status = 'unsubmitted') = (anchor_id IS NULL)),
    CHECK ((cipher_iv IS NULL) = (cipher_auth_tag IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_documents_anchor ON documents(anchor_id);
CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(anchor_status);

CREATE TRIGGER IF NOT EXISTS documents_content_hash_immutable
BEFORE UPDATE OF content_hash, metadata_envelope ON documents
WHEN NEW.content_hash IS NOT OLD.content_hash
  OR NEW.metadata_envelope IS NOT OLD.metadata_envelope
BEGIN
    SELECT RAISE(ABORT, 'content_hash and metadata_envelope are immutable');
END;

CREATE TRIGGER IF NOT EXISTS documents_status_forward_only
BEFORE UPDATE OF anchor_status ON documents
WHEN NEW.anchor_status IS NOT OLD.anchor_status
 AND NOT (
        (OLD.anchor_status = 'unsubmitted' AND NEW.anchor_status = 'pending')
     OR (OLD.anchor_status = 'pending' AND NEW.anchor_status IN ('confirmed', 'failed'))
 )
BEGIN
    SELECT RAISE(ABORT, 'anchor_status may only move forward');
END;
"#;

/// Key vault schema, v1. Lives in its own database file.
pub const VAULT_SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS document_keys (
    document_id TEXT PRIMARY KEY,
    key_hex TEXT NOT NULL,
    stored_at INTEGER NOT NULL
);
"#;
