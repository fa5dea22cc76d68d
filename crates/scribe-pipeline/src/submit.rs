//! Anchoring submission.
//!
//! Wraps a frozen envelope into inscription content, splits it when it
//! exceeds the stitch threshold, submits it, and on success moves the
//! document `unsubmitted -> pending` and schedules exactly one reconciler.
//! A failed submission leaves the document `unsubmitted`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use scribe_anchor::client::{InscriptionRequest, DEFAULT_FEE};
use scribe_anchor::{envelope, stitch, AnchorService};
use scribe_db::queries::documents;
use scribe_types::envelope::MetadataEnvelope;
use scribe_types::events::EventType;
use scribe_types::{AnchorId, DocumentId};

use crate::events::EventBus;
use crate::reconcile::ReconcilerRegistry;
use crate::{PipelineError, Result, SharedConnection};

/// Request parameters (config section `[anchor]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitterConfig {
    /// Address that receives the inscription.
    pub receive_address: String,
    /// Fee rate in sats/vB.
    pub fee: u64,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            receive_address: String::new(),
            fee: DEFAULT_FEE,
        }
    }
}

#[derive(Clone)]
pub struct Submitter {
    db: SharedConnection,
    service: Arc<dyn AnchorService>,
    events: EventBus,
    reconcilers: ReconcilerRegistry,
    config: SubmitterConfig,
}

impl Submitter {
    pub fn new(
        db: SharedConnection,
        service: Arc<dyn AnchorService>,
        events: EventBus,
        reconcilers: ReconcilerRegistry,
        config: SubmitterConfig,
    ) -> Self {
        Self {
            db,
            service,
            events,
            reconcilers,
            config,
        }
    }

    /// Build the inscription request for a document without sending it.
    pub fn build_request(
        &self,
        document_id: &DocumentId,
        envelope: &MetadataEnvelope,
    ) -> Result<InscriptionRequest> {
        let content = envelope::inscription_content(*document_id, envelope);
        let encoded =
            envelope::encode_content(&content).map_err(|e| PipelineError::Internal(e.to_string()))?;
        let files =
            stitch::package(document_id, &encoded).map_err(|e| PipelineError::Internal(e.to_string()))?;

        Ok(InscriptionRequest {
            files,
            low_postage: true,
            receive_address: self.config.receive_address.clone(),
            fee: self.config.fee,
        })
    }

    /// Submit and, on success, record `pending` and schedule a reconciler.
    pub async fn submit(&self, document_id: &DocumentId, envelope: &MetadataEnvelope) -> Result<AnchorId> {
        let request = self.build_request(document_id, envelope)?;

        let receipt = match self.service.submit(&request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(
                    document_id = %document_id,
                    service = self.service.name(),
                    error = %e,
                    "anchoring submission failed, document stays unsubmitted"
                );
                self.events.emit(
                    EventType::AnchorSubmitFailed,
                    serde_json::json!({
                        "document_id": document_id,
                        "reason": e.to_string(),
                    }),
                );
                return Err(PipelineError::AnchoringUnavailable {
                    document_id: Some(*document_id),
                    reason: e.to_string(),
                    receipt: None,
                });
            }
        };

        let moved = {
            let conn = self.db.lock().await;
            documents::mark_pending(&conn, document_id, &receipt.id)?
        };
        if !moved {
            // Someone else submitted first; this anchor is orphaned at the service.
            error!(
                document_id = %document_id,
                anchor_id = %receipt.id,
                "document was no longer unsubmitted after submission"
            );
            return Err(PipelineError::InvalidState(format!(
                "document {document_id} is no longer unsubmitted"
            )));
        }

        info!(
            document_id = %document_id,
            anchor_id = %receipt.id,
            files = request.files.len(),
            "anchor submitted"
        );
        self.events.emit(
            EventType::AnchorSubmitted,
            serde_json::json!({
                "document_id": document_id,
                "anchor_id": receipt.id,
                "files": request.files.len(),
            }),
        );

        self.reconcilers.spawn(*document_id, receipt.id.clone()).await;
        Ok(receipt.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_anchor::simulated::{ScriptedPoll, SimulatedAnchorService};
    use scribe_types::document::Category;
    use scribe_types::envelope::EnvelopeFields;
    use scribe_types::STITCH_SPLIT_THRESHOLD;

    fn submitter(service: Arc<SimulatedAnchorService>) -> Submitter {
        let conn = scribe_db::open_memory().expect("open db");
        let db: SharedConnection = Arc::new(tokio::sync::Mutex::new(conn));
        let events = EventBus::new(16);
        let registry = ReconcilerRegistry::new(
            db.clone(),
            service.clone(),
            events.clone(),
            crate::reconcile::ReconcilePolicy::default(),
        );
        Submitter::new(
            db,
            service,
            events,
            registry,
            SubmitterConfig {
                receive_address: "bc1qreceiver".to_string(),
                fee: 12,
            },
        )
    }

    fn envelope_with_title(title: String) -> MetadataEnvelope {
        envelope::build_envelope(&EnvelopeFields {
            title,
            description: String::new(),
            category: Category::Research,
            tags: vec![],
            author_identity: "a".to_string(),
            anonymous: true,
            created_at: 0,
            encrypted: false,
            content_hash: scribe_crypto::content_hash::digest(b"x"),
            file_size: 1,
            mime_type: "text/plain".to_string(),
        })
    }

    #[test]
    fn test_request_single_file() {
        let s = submitter(Arc::new(SimulatedAnchorService::new()));
        let id = DocumentId::new_v4();
        let request = s
            .build_request(&id, &envelope_with_title("short".to_string()))
            .expect("build");

        assert!(request.low_postage);
        assert_eq!(request.fee, 12);
        assert_eq!(request.receive_address, "bc1qreceiver");
        assert_eq!(request.files.len(), 1);
        assert_eq!(request.files[0].name, stitch::file_name(&id));

        let body = stitch::unpack(&request.files).expect("unpack");
        let content: envelope::InscriptionContent = serde_json::from_slice(&body).expect("json");
        assert_eq!(content.bootstrap.data.document_id, id);
        assert_eq!(content.metadata.author, "Anonymous");
    }

    #[test]
    fn test_request_oversized_is_split() {
        let s = submitter(Arc::new(SimulatedAnchorService::new()));
        let id = DocumentId::new_v4();
        let envelope = envelope_with_title("x".repeat(STITCH_SPLIT_THRESHOLD));
        let request = s.build_request(&id, &envelope).expect("build");

        assert!(request.files.len() > 1);
        let body = stitch::unpack(&request.files).expect("unpack");
        let content: envelope::InscriptionContent = serde_json::from_slice(&body).expect("json");
        assert_eq!(content.metadata, envelope);
    }

    #[tokio::test]
    async fn test_submit_unknown_document_is_invalid_state() {
        let service = Arc::new(SimulatedAnchorService::with_script(vec![ScriptedPoll::pending()]));
        let s = submitter(service.clone());
        let err = s
            .submit(&DocumentId::new_v4(), &envelope_with_title("t".to_string()))
            .await
            .expect_err("no such document");
        assert!(matches!(err, PipelineError::InvalidState(_)));
        assert_eq!(service.submit_calls(), 1);
    }
}
