//! Ingestion orchestration.
//!
//! `ingest` runs policy check, hash, dedup lookup, optional sealing, upload,
//! key custody, insert and submission, in that order. Everything up to
//! `pending` happens before the caller gets a receipt. Dedup happens before
//! any storage or anchoring call.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use scribe_anchor::{envelope, AnchorService, StatusReport};
use scribe_crypto::{aead, content_hash};
use scribe_db::queries::documents;
use scribe_db::DbError;
use scribe_storage::{StorageAdapter, StorageError};
use scribe_types::document::{AnchorStatus, Document, EncryptionMaterial};
use scribe_types::envelope::{EnvelopeFields, MetadataEnvelope};
use scribe_types::events::EventType;
use scribe_types::ingest::{IngestReceipt, IngestRequest};
use scribe_types::DocumentId;

use crate::custody::KeyCustody;
use crate::events::EventBus;
use crate::policy::{normalize_tags, IngestPolicy};
use crate::reconcile::{ReconcilePolicy, ReconcilerRegistry};
use crate::submit::{Submitter, SubmitterConfig};
use crate::{PipelineError, Result, SharedConnection};

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub policy: IngestPolicy,
    pub submitter: SubmitterConfig,
    pub reconcile: ReconcilePolicy,
}

/// The document ingestion and anchoring pipeline.
#[derive(Clone)]
pub struct Pipeline {
    db: SharedConnection,
    storage: StorageAdapter,
    anchor: Arc<dyn AnchorService>,
    custody: KeyCustody,
    policy: IngestPolicy,
    events: EventBus,
    submitter: Submitter,
    reconcilers: ReconcilerRegistry,
}

impl Pipeline {
    pub fn new(
        db: SharedConnection,
        storage: StorageAdapter,
        anchor: Arc<dyn AnchorService>,
        custody: KeyCustody,
        events: EventBus,
        config: PipelineConfig,
    ) -> Self {
        let reconcilers =
            ReconcilerRegistry::new(db.clone(), anchor.clone(), events.clone(), config.reconcile);
        let submitter = Submitter::new(
            db.clone(),
            anchor.clone(),
            events.clone(),
            reconcilers.clone(),
            config.submitter,
        );
        Self {
            db,
            storage,
            anchor,
            custody,
            policy: config.policy,
            events,
            submitter,
            reconcilers,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn reconcilers(&self) -> &ReconcilerRegistry {
        &self.reconcilers
    }

    /// Ingest one file.
    ///
    /// If submission fails the document is kept `unsubmitted` and
    /// [`PipelineError::AnchoringUnavailable`] carries the receipt. Any other
    /// failure after the row is written is [`PipelineError::IngestIncomplete`],
    /// which also carries it. Failures before that leave no row behind.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReceipt> {
        self.policy.check(&request)?;

        let hash = content_hash::digest(&request.bytes);
        {
            let conn = self.db.lock().await;
            if let Some(existing) = documents::find_by_content_hash(&conn, &hash)? {
                info!(content_hash = %hash.short(), existing = %existing.id, "duplicate content rejected");
                return Err(PipelineError::DuplicateContent {
                    content_hash: hash.to_string(),
                    existing: existing.id.to_string(),
                });
            }
        }

        let (blob, material): (Vec<u8>, Option<EncryptionMaterial>) = if request.encrypt_requested {
            let sealed = aead::seal(&request.bytes)?;
            (sealed.ciphertext, Some(sealed.material))
        } else {
            (request.bytes.clone(), None)
        };

        let document_id = DocumentId::new_v4();
        let storage_ref = self.storage.upload(&blob, &request.file_name, &hash).await;

        let created_at = scribe_db::unix_now();
        let tags = normalize_tags(&request.tags);
        let metadata_envelope = envelope::build_envelope(&EnvelopeFields {
            title: request.title.trim().to_string(),
            description: request.description.clone(),
            category: request.category,
            tags: tags.clone(),
            author_identity: request.author_identity.clone(),
            anonymous: request.anonymize,
            created_at,
            encrypted: material.is_some(),
            content_hash: hash.clone(),
            file_size: request.bytes.len() as u64,
            mime_type: request.mime_type.clone(),
        });

        let doc = Document {
            id: document_id,
            title: request.title.trim().to_string(),
            description: request.description,
            category: request.category,
            tags,
            author_identity: request.author_identity,
            anonymous: request.anonymize,
            file_name: request.file_name,
            file_size: request.bytes.len() as u64,
            mime_type: request.mime_type,
            content_hash: hash.clone(),
            storage_ref: Some(storage_ref.clone()),
            encryption: material.as_ref().map(EncryptionMaterial::params),
            anchor_id: None,
            anchor_status: AnchorStatus::Unsubmitted,
            txid: None,
            anchor_height: None,
            metadata_envelope,
            created_at,
            reconcile_exhausted_at: None,
        };

        // The key is in custody before the row exists, so a recorded
        // encrypted document always has a retrievable key.
        let decryption_key = match &material {
            Some(m) => match self.custody.take(&document_id, m).await {
                Ok(key) => key,
                Err(e) => {
                    warn!(document_id = %document_id, error = %e, "key custody failed, discarding upload");
                    self.storage.unpin(&storage_ref).await;
                    return Err(e);
                }
            },
            None => None,
        };

        let inserted = {
            let conn = self.db.lock().await;
            documents::insert(&conn, &doc)
        };
        if let Err(e) = inserted {
            if material.is_some() {
                self.custody.release(&document_id).await;
            }
            let DbError::DuplicateContentHash(_) = e else {
                self.storage.unpin(&storage_ref).await;
                return Err(e.into());
            };
            info!(content_hash = %hash.short(), "duplicate content lost insert race");
            let existing = {
                let conn = self.db.lock().await;
                documents::find_by_content_hash(&conn, &hash)
            };
            let existing = match existing {
                Ok(existing) => existing,
                Err(e) => {
                    self.storage.unpin(&storage_ref).await;
                    return Err(e.into());
                }
            };
            // Identical plaintext can map to the same cid; the winner still needs it.
            let shared = existing
                .as_ref()
                .and_then(|d| d.storage_ref.as_ref())
                .is_some_and(|winner| *winner == storage_ref);
            if !shared {
                self.storage.unpin(&storage_ref).await;
            }
            return Err(PipelineError::DuplicateContent {
                content_hash: hash.to_string(),
                existing: existing.map(|d| d.id.to_string()).unwrap_or_default(),
            });
        }

        info!(
            document_id = %document_id,
            content_hash = %hash.short(),
            storage_ref = %storage_ref,
            encrypted = material.is_some(),
            "document ingested"
        );
        self.events.emit(
            EventType::DocumentIngested,
            serde_json::json!({
                "document_id": document_id,
                "content_hash": hash,
                "storage_ref": storage_ref,
                "placeholder": storage_ref.is_placeholder(),
                "encrypted": material.is_some(),
            }),
        );

        let mut receipt = IngestReceipt {
            document_id,
            content_hash: hash,
            storage_ref,
            anchor_id: None,
            anchor_status: AnchorStatus::Unsubmitted,
            decryption_key,
        };

        match self.submitter.submit(&document_id, &doc.metadata_envelope).await {
            Ok(anchor_id) => {
                receipt.anchor_id = Some(anchor_id);
                receipt.anchor_status = AnchorStatus::Pending;
                Ok(receipt)
            }
            Err(PipelineError::AnchoringUnavailable {
                document_id, reason, ..
            }) => Err(PipelineError::AnchoringUnavailable {
                document_id,
                reason,
                receipt: Some(Box::new(receipt)),
            }),
            Err(e) => {
                error!(
                    document_id = %document_id,
                    error = %e,
                    "document recorded but submission bookkeeping failed"
                );
                Err(PipelineError::IngestIncomplete {
                    document_id,
                    reason: e.to_string(),
                    receipt: Box::new(receipt),
                })
            }
        }
    }

    /// Retry submission of an `unsubmitted` document with its frozen envelope.
    pub async fn retry_submission(&self, document_id: &DocumentId) -> Result<IngestReceipt> {
        let doc = self.get_document(document_id).await?;
        if !doc.anchor_status.can_transition_to(AnchorStatus::Pending) {
            return Err(PipelineError::InvalidState(format!(
                "document {document_id} is already {}",
                doc.anchor_status
            )));
        }
        let storage_ref = doc.storage_ref.clone().ok_or_else(|| {
            PipelineError::InvalidState(format!("document {document_id} has no storage reference"))
        })?;

        let anchor_id = self.submitter.submit(document_id, &doc.metadata_envelope).await?;
        info!(document_id = %document_id, anchor_id = %anchor_id, "submission retried");
        Ok(IngestReceipt {
            document_id: doc.id,
            content_hash: doc.content_hash,
            storage_ref,
            anchor_id: Some(anchor_id),
            anchor_status: AnchorStatus::Pending,
            decryption_key: None,
        })
    }

    /// Fetch, decrypt if needed, and verify a document's content.
    ///
    /// `key` overrides the vault. Encrypted documents without any key fail
    /// with [`PipelineError::KeyRequired`].
    pub async fn fetch_document(&self, document_id: &DocumentId, key: Option<&str>) -> Result<Vec<u8>> {
        let doc = self.get_document(document_id).await?;
        let storage_ref = doc.storage_ref.as_ref().ok_or_else(|| {
            PipelineError::StorageUnavailable(format!("document {document_id} was never uploaded"))
        })?;

        let blob = self.storage.fetch(storage_ref).await.map_err(|e| match e {
            StorageError::NotFound(cid) => PipelineError::StorageUnavailable(format!("blob {cid} is not pinned")),
            other => PipelineError::StorageUnavailable(other.to_string()),
        })?;

        let plaintext = match &doc.encryption {
            Some(params) => {
                let key = match key {
                    Some(k) => k.to_string(),
                    None => self
                        .custody
                        .lookup(document_id)
                        .await?
                        .ok_or(PipelineError::KeyRequired(*document_id))?,
                };
                let material = EncryptionMaterial::from_parts(key, params);
                aead::open(&blob, &material)?
            }
            None => blob,
        };

        if !content_hash::verify(&plaintext, &doc.content_hash) {
            warn!(document_id = %document_id, "retrieved content does not match its hash");
            return Err(PipelineError::IntegrityMismatch(*document_id));
        }
        debug!(document_id = %document_id, bytes = plaintext.len(), "document fetched");
        Ok(plaintext)
    }

    /// Build an envelope without persisting anything.
    pub fn preview_envelope(&self, fields: &EnvelopeFields) -> MetadataEnvelope {
        envelope::build_envelope(fields)
    }

    pub async fn get_document(&self, document_id: &DocumentId) -> Result<Document> {
        let conn = self.db.lock().await;
        Ok(documents::get(&conn, document_id)?)
    }

    /// Documents still waiting on the anchoring service.
    pub async fn list_pending(&self) -> Result<Vec<Document>> {
        let conn = self.db.lock().await;
        Ok(documents::list_by_status(&conn, AnchorStatus::Pending)?)
    }

    /// Ask the anchoring service directly. Does not touch the document.
    pub async fn query_anchor_status(&self, anchor_id: &str) -> Result<StatusReport> {
        self.anchor
            .query_status(anchor_id)
            .await
            .map_err(|e| PipelineError::AnchoringUnavailable {
                document_id: None,
                reason: e.to_string(),
                receipt: None,
            })
    }
}
