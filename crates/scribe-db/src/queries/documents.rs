//! Document record queries.
//!
//! Status writes are conditional on the current status so that a duplicate or
//! late writer is a no-op instead of a regression. Each returns `true` when a
//! row actually changed.

use rusqlite::{Connection, OptionalExtension, Row};
use scribe_types::document::{AnchorStatus, CipherParams, Document};
use scribe_types::envelope::MetadataEnvelope;
use scribe_types::{ContentHash, DocumentId, StorageRef};

use crate::{DbError, Result};

const SELECT_COLUMNS: &str = "SELECT id, title, description, category, tags, author_identity,
        anonymous, file_name, file_size, mime_type, content_hash, storage_ref,
        cipher_iv, cipher_auth_tag, anchor_id, anchor_status, txid, anchor_height,
        metadata_envelope, created_at, reconcile_exhausted_at
 FROM documents";

/// Insert a new document.
///
/// Fails with [`DbError::DuplicateContentHash`] if the content hash is taken.
pub fn insert(conn: &Connection, doc: &Document) -> Result<()> {
    let tags_json =
        serde_json::to_string(&doc.tags).map_err(|e| DbError::Serialization(e.to_string()))?;
    let envelope_json = serde_json::to_string(&doc.metadata_envelope)
        .map_err(|e| DbError::Serialization(e.to_string()))?;

    conn.execute(
        "INSERT INTO documents
         (id, title, description, category, tags, author_identity, anonymous,
          file_name, file_size, mime_type, content_hash, storage_ref,
          cipher_iv, cipher_auth_tag, anchor_id, anchor_status, txid, anchor_height,
          metadata_envelope, created_at, reconcile_exhausted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18, ?19, ?20, ?21)",
        rusqlite::params![
            doc.id.to_string(),
            doc.title,
            doc.description,
            doc.category.as_str(),
            tags_json,
            doc.author_identity,
            doc.anonymous,
            doc.file_name,
            doc.file_size as i64,
            doc.mime_type,
            doc.content_hash.as_str(),
            doc.storage_ref.as_ref().map(|r| r.to_string()),
            doc.encryption.as_ref().map(|e| e.iv.as_str()),
            doc.encryption.as_ref().map(|e| e.auth_tag.as_str()),
            doc.anchor_id,
            doc.anchor_status.as_str(),
            doc.txid,
            doc.anchor_height.map(|h| h as i64),
            envelope_json,
            doc.created_at as i64,
            doc.reconcile_exhausted_at.map(|t| t as i64),
        ],
    )
    .map_err(|e| classify_insert_error(e, &doc.content_hash))?;
    Ok(())
}

fn classify_insert_error(err: rusqlite::Error, content_hash: &ContentHash) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(code, msg)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            let detail = msg.clone().unwrap_or_default();
            if detail.contains("documents.content_hash") {
                DbError::DuplicateContentHash(content_hash.to_string())
            } else {
                DbError::Constraint(detail)
            }
        }
        _ => DbError::Sqlite(err),
    }
}

/// Fetch a document by id.
pub fn get(conn: &Connection, id: &DocumentId) -> Result<Document> {
    let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
    conn.query_row(&sql, [id.to_string()], DocumentRow::from_row)
        .optional()?
        .ok_or_else(|| DbError::NotFound(format!("document {id}")))?
        .try_into()
}

/// Fetch the document with the given content hash, if any.
pub fn find_by_content_hash(conn: &Connection, hash: &ContentHash) -> Result<Option<Document>> {
    let sql = format!("{SELECT_COLUMNS} WHERE content_hash = ?1");
    conn.query_row(&sql, [hash.as_str()], DocumentRow::from_row)
        .optional()?
        .map(Document::try_from)
        .transpose()
}

/// List documents in a given status, oldest first.
pub fn list_by_status(conn: &Connection, status: AnchorStatus) -> Result<Vec<Document>> {
    let sql = format!("{SELECT_COLUMNS} WHERE anchor_status = ?1 ORDER BY created_at ASC, id ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([status.as_str()], DocumentRow::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(Document::try_from).collect()
}

/// `unsubmitted -> pending`, recording the anchor id.
pub fn mark_pending(conn: &Connection, id: &DocumentId, anchor_id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE documents SET anchor_status = 'pending', anchor_id = ?2
         WHERE id = ?1 AND anchor_status = 'unsubmitted'",
        rusqlite::params![id.to_string(), anchor_id],
    )?;
    Ok(changed == 1)
}

/// `pending -> confirmed`. A `None` anchor id keeps the one recorded at submission.
pub fn mark_confirmed(
    conn: &Connection,
    id: &DocumentId,
    anchor_id: Option<&str>,
    txid: Option<&str>,
    height: Option<u64>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE documents
         SET anchor_status = 'confirmed', anchor_id = COALESCE(?2, anchor_id),
             txid = ?3, anchor_height = ?4
         WHERE id = ?1 AND anchor_status = 'pending'",
        rusqlite::params![id.to_string(), anchor_id, txid, height.map(|h| h as i64)],
    )?;
    Ok(changed == 1)
}

/// `pending -> failed`.
pub fn mark_failed(conn: &Connection, id: &DocumentId) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE documents SET anchor_status = 'failed'
         WHERE id = ?1 AND anchor_status = 'pending'",
        [id.to_string()],
    )?;
    Ok(changed == 1)
}

/// Record that polling gave up while the anchor was still pending.
pub fn mark_reconcile_exhausted(conn: &Connection, id: &DocumentId, at: u64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE documents SET reconcile_exhausted_at = ?2
         WHERE id = ?1 AND anchor_status = 'pending'",
        rusqlite::params![id.to_string(), at as i64],
    )?;
    Ok(changed == 1)
}

/// Clear the exhaustion marker when polling is resumed.
pub fn clear_reconcile_exhausted(conn: &Connection, id: &DocumentId) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE documents SET reconcile_exhausted_at = NULL
         WHERE id = ?1 AND anchor_status = 'pending' AND reconcile_exhausted_at IS NOT NULL",
        [id.to_string()],
    )?;
    Ok(changed == 1)
}

/// A raw document row.
#[derive(Debug)]
struct DocumentRow {
    id: String,
    title: String,
    description: String,
    category: String,
    tags: String,
    author_identity: String,
    anonymous: bool,
    file_name: String,
    file_size: i64,
    mime_type: String,
    content_hash: String,
    storage_ref: Option<String>,
    cipher_iv: Option<String>,
    cipher_auth_tag: Option<String>,
    anchor_id: Option<String>,
    anchor_status: String,
    txid: Option<String>,
    anchor_height: Option<i64>,
    metadata_envelope: String,
    created_at: i64,
    reconcile_exhausted_at: Option<i64>,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            tags: row.get(4)?,
            author_identity: row.get(5)?,
            anonymous: row.get(6)?,
            file_name: row.get(7)?,
            file_size: row.get(8)?,
            mime_type: row.get(9)?,
            content_hash: row.get(10)?,
            storage_ref: row.get(11)?,
            cipher_iv: row.get(12)?,
            cipher_auth_tag: row.get(13)?,
            anchor_id: row.get(14)?,
            anchor_status: row.get(15)?,
            txid: row.get(16)?,
            anchor_height: row.get(17)?,
            metadata_envelope: row.get(18)?,
            created_at: row.get(19)?,
            reconcile_exhausted_at: row.get(20)?,
        })
    }
}

fn ser(e: impl std::fmt::Display) -> DbError {
    DbError::Serialization(e.to_string())
}

impl TryFrom<DocumentRow> for Document {
    type Error = DbError;

    fn try_from(row: DocumentRow) -> Result<Self> {
        let encryption = match (row.cipher_iv, row.cipher_auth_tag) {
            (Some(iv), Some(auth_tag)) => Some(CipherParams { iv, auth_tag }),
            _ => None,
        };
        let storage_ref = row
            .storage_ref
            .map(|s| s.parse::<StorageRef>())
            .transpose()
            .map_err(ser)?;
        let metadata_envelope: MetadataEnvelope =
            serde_json::from_str(&row.metadata_envelope).map_err(ser)?;

        Ok(Document {
            id: row.id.parse().map_err(ser)?,
            title: row.title,
            description: row.description,
            category: row.category.parse().map_err(ser)?,
            tags: serde_json::from_str(&row.tags).map_err(ser)?,
            author_identity: row.author_identity,
            anonymous: row.anonymous,
            file_name: row.file_name,
            file_size: row.file_size as u64,
            mime_type: row.mime_type,
            content_hash: row.content_hash.parse().map_err(ser)?,
            storage_ref,
            encryption,
            anchor_id: row.anchor_id,
            anchor_status: row.anchor_status.parse().map_err(ser)?,
            txid: row.txid,
            anchor_height: row.anchor_height.map(|h| h as u64),
            metadata_envelope,
            created_at: row.created_at as u64,
            reconcile_exhausted_at: row.reconcile_exhausted_at.map(|t| t as u64),
        })
    }
}
