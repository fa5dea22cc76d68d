//! Integration test: status reconciliation after submission.
//!
//! Exercises the reconciler against scripted anchoring responses:
//! 1. pending, pending, confirmed: confirmed after exactly three polls
//! 2. pending forever: stays pending, stops after the last attempt
//! 3. terminal states are sticky
//! 4. a restarted process resumes polling for pending documents
//!
//! Time is paused so the 30 second poll interval costs nothing.

use std::sync::Arc;

use scribe_anchor::simulated::{ScriptedPoll, SimulatedAnchorService};
use scribe_db::queries::documents;
use scribe_pipeline::custody::KeyCustody;
use scribe_pipeline::events::EventBus;
use scribe_pipeline::reconcile::{ReconcilePhase, DEFAULT_MAX_ATTEMPTS};
use scribe_pipeline::{Pipeline, PipelineConfig, PipelineError, SharedConnection};
use scribe_storage::simulated::SimulatedBackend;
use scribe_storage::StorageAdapter;
use scribe_types::document::{AnchorStatus, Category};
use scribe_types::events::EventType;
use scribe_types::ingest::{IngestReceipt, IngestRequest};

fn shared_db() -> SharedConnection {
    let conn = scribe_db::open_memory().expect("open db");
    Arc::new(tokio::sync::Mutex::new(conn))
}

fn pipeline(db: SharedConnection, anchor: Arc<SimulatedAnchorService>) -> Pipeline {
    Pipeline::new(
        db,
        StorageAdapter::new(Arc::new(SimulatedBackend::new())),
        anchor,
        KeyCustody::ClientHeld,
        EventBus::new(256),
        PipelineConfig::default(),
    )
}

async fn ingest(pipeline: &Pipeline, bytes: &[u8]) -> IngestReceipt {
    pipeline
        .ingest(IngestRequest {
            bytes: bytes.to_vec(),
            file_name: "report.txt".to_string(),
            mime_type: "text/plain".to_string(),
            title: "Report".to_string(),
            description: String::new(),
            category: Category::Research,
            tags: Vec::new(),
            encrypt_requested: false,
            anonymize: false,
            author_identity: "lab".to_string(),
        })
        .await
        .expect("ingest")
}

// =========================================================================
// Confirmation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_confirmed_after_three_polls() {
    let anchor = Arc::new(SimulatedAnchorService::with_script(vec![
        ScriptedPoll::pending(),
        ScriptedPoll::pending(),
        ScriptedPoll::confirmed("abc123"),
    ]));
    let db = shared_db();
    let p = pipeline(db.clone(), anchor.clone());
    let mut events = p.events().subscribe();

    let receipt = ingest(&p, b"three polls").await;
    let anchor_id = receipt.anchor_id.clone().expect("anchor id");

    let snapshot = p.reconcilers().wait(&anchor_id).await.expect("snapshot");
    assert_eq!(snapshot.phase, ReconcilePhase::Confirmed);
    assert_eq!(snapshot.attempts, 3);
    assert_eq!(anchor.poll_calls(), 3);

    let doc = p.get_document(&receipt.document_id).await.expect("get");
    assert_eq!(doc.anchor_status, AnchorStatus::Confirmed);
    assert_eq!(doc.txid.as_deref(), Some("abc123"));
    assert_eq!(doc.anchor_id.as_deref(), Some(anchor_id.as_str()));

    let mut confirmed = 0;
    while let Ok(event) = events.try_recv() {
        if event.event_type == EventType::AnchorConfirmed {
            confirmed += 1;
            assert_eq!(event.payload["txid"], "abc123");
        }
    }
    assert_eq!(confirmed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_anchor_is_recorded() {
    let anchor = Arc::new(SimulatedAnchorService::with_script(vec![
        ScriptedPoll::pending(),
        ScriptedPoll::failed(),
    ]));
    let p = pipeline(shared_db(), anchor.clone());

    let receipt = ingest(&p, b"will fail").await;
    let anchor_id = receipt.anchor_id.clone().expect("anchor id");
    let snapshot = p.reconcilers().wait(&anchor_id).await.expect("snapshot");

    assert_eq!(snapshot.phase, ReconcilePhase::Failed);
    assert_eq!(anchor.poll_calls(), 2);
    let doc = p.get_document(&receipt.document_id).await.expect("get");
    assert_eq!(doc.anchor_status, AnchorStatus::Failed);
    assert!(doc.txid.is_none());
}

// =========================================================================
// Exhaustion
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_never_confirmed_stays_pending() {
    let anchor = Arc::new(SimulatedAnchorService::with_script(vec![ScriptedPoll::pending()]));
    let p = pipeline(shared_db(), anchor.clone());
    let mut events = p.events().subscribe();

    let receipt = ingest(&p, b"stuck in mempool").await;
    let anchor_id = receipt.anchor_id.clone().expect("anchor id");
    let snapshot = p.reconcilers().wait(&anchor_id).await.expect("snapshot");

    assert_eq!(snapshot.phase, ReconcilePhase::Exhausted);
    assert_eq!(snapshot.attempts, DEFAULT_MAX_ATTEMPTS);
    assert_eq!(anchor.poll_calls(), DEFAULT_MAX_ATTEMPTS as usize);

    let doc = p.get_document(&receipt.document_id).await.expect("get");
    assert_eq!(doc.anchor_status, AnchorStatus::Pending);
    assert!(doc.reconcile_exhausted_at.is_some());

    // No further polling once the budget is spent.
    tokio::time::sleep(p.reconcilers().policy().interval * 5).await;
    assert_eq!(anchor.poll_calls(), DEFAULT_MAX_ATTEMPTS as usize);

    let stalled = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| e.event_type == EventType::AnchorStalled)
        .count();
    assert_eq!(stalled, 1);

    // An operator can grant a fresh budget.
    assert!(p.reconcilers().resume(&receipt.document_id).await.expect("resume"));
    let doc = p.get_document(&receipt.document_id).await.expect("get");
    assert!(doc.reconcile_exhausted_at.is_none());
}

// =========================================================================
// Sticky terminal states
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_terminal_states_are_sticky() {
    let anchor = Arc::new(SimulatedAnchorService::with_script(vec![
        ScriptedPoll::confirmed("final"),
    ]));
    let db = shared_db();
    let p = pipeline(db.clone(), anchor.clone());

    let receipt = ingest(&p, b"sticky").await;
    let anchor_id = receipt.anchor_id.clone().expect("anchor id");
    p.reconcilers().wait(&anchor_id).await.expect("snapshot");

    {
        let conn = db.lock().await;
        assert!(!documents::mark_failed(&conn, &receipt.document_id).expect("mark failed"));
        assert!(!documents::mark_pending(&conn, &receipt.document_id, "other").expect("mark pending"));
        assert!(!documents::mark_confirmed(&conn, &receipt.document_id, None, Some("other"), None)
            .expect("mark confirmed"));
    }

    let doc = p.get_document(&receipt.document_id).await.expect("get");
    assert_eq!(doc.anchor_status, AnchorStatus::Confirmed);
    assert_eq!(doc.txid.as_deref(), Some("final"));

    assert!(matches!(
        p.reconcilers().resume(&receipt.document_id).await,
        Err(PipelineError::InvalidState(_))
    ));
    assert!(matches!(
        p.retry_submission(&receipt.document_id).await,
        Err(PipelineError::InvalidState(_))
    ));
}

// =========================================================================
// Restart
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_restart_resumes_pending_documents() {
    let db = shared_db();
    let anchor = Arc::new(SimulatedAnchorService::with_script(vec![
        ScriptedPoll::confirmed("after-restart"),
    ]));
    let first = pipeline(db.clone(), anchor.clone());

    let receipt = ingest(&first, b"survives restart").await;
    let anchor_id = receipt.anchor_id.clone().expect("anchor id");
    assert!(first.reconcilers().stop(&anchor_id).await);
    drop(first);

    let second = pipeline(db.clone(), anchor.clone());
    assert_eq!(second.reconcilers().resume_all_pending().await.expect("resume"), 1);

    let snapshot = second.reconcilers().wait(&anchor_id).await.expect("snapshot");
    assert_eq!(snapshot.phase, ReconcilePhase::Confirmed);

    let doc = second.get_document(&receipt.document_id).await.expect("get");
    assert_eq!(doc.anchor_status, AnchorStatus::Confirmed);
    assert_eq!(doc.txid.as_deref(), Some("after-restart"));
    assert_eq!(anchor.submit_calls(), 1);
}
