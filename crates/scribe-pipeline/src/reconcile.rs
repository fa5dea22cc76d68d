//! Status reconciliation.
//!
//! One tokio task per in-flight anchor id. Each attempt sleeps for the
//! policy interval, then queries the anchoring service. A terminal
//! observation performs one conditional write and ends the task. Query
//! errors consume the attempt. When the budget runs out the document stays
//! `pending`, is stamped `reconcile_exhausted_at`, and an `AnchorStalled`
//! event is emitted.
//!
//! The [`ReconcilerRegistry`] keys tasks by anchor id so they can be
//! inspected, stopped and resumed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use scribe_anchor::{AnchorService, RemoteStatus, StatusReport};
use scribe_db::queries::documents;
use scribe_types::document::AnchorStatus;
use scribe_types::events::EventType;
use scribe_types::{AnchorId, DocumentId};

use crate::events::EventBus;
use crate::{PipelineError, Result, SharedConnection};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Polling budget (config section `[reconcile]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePhase {
    Running,
    Confirmed,
    Failed,
    /// Budget spent while still pending.
    Exhausted,
    /// Force-stopped by an operator.
    Stopped,
}

/// Point-in-time view of one reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerSnapshot {
    pub anchor_id: AnchorId,
    pub document_id: DocumentId,
    pub phase: ReconcilePhase,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_remote_status: Option<String>,
    pub started_at: u64,
    pub finished_at: Option<u64>,
}

struct Entry {
    snapshot: ReconcilerSnapshot,
    phase_tx: watch::Sender<ReconcilePhase>,
    handle: Option<JoinHandle<()>>,
}

struct Shared {
    db: SharedConnection,
    service: Arc<dyn AnchorService>,
    events: EventBus,
    policy: ReconcilePolicy,
    entries: Mutex<HashMap<AnchorId, Entry>>,
}

/// Registry of reconciler tasks, keyed by anchor id.
#[derive(Clone)]
pub struct ReconcilerRegistry {
    shared: Arc<Shared>,
}

impl ReconcilerRegistry {
    pub fn new(
        db: SharedConnection,
        service: Arc<dyn AnchorService>,
        events: EventBus,
        policy: ReconcilePolicy,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                db,
                service,
                events,
                policy,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.shared.policy
    }

    /// Start polling `anchor_id`. Returns `false` if a task for it is
    /// already running.
    pub async fn spawn(&self, document_id: DocumentId, anchor_id: AnchorId) -> bool {
        let mut entries = self.shared.entries.lock().await;
        if entries
            .get(&anchor_id)
            .is_some_and(|e| e.snapshot.phase == ReconcilePhase::Running)
        {
            debug!(anchor_id = %anchor_id, "reconciler already running");
            return false;
        }

        let (phase_tx, _) = watch::channel(ReconcilePhase::Running);
        let snapshot = ReconcilerSnapshot {
            anchor_id: anchor_id.clone(),
            document_id,
            phase: ReconcilePhase::Running,
            attempts: 0,
            max_attempts: self.shared.policy.max_attempts,
            last_remote_status: None,
            started_at: scribe_db::unix_now(),
            finished_at: None,
        };
        let handle = tokio::spawn(run(self.shared.clone(), document_id, anchor_id.clone()));
        entries.insert(
            anchor_id.clone(),
            Entry {
                snapshot,
                phase_tx,
                handle: Some(handle),
            },
        );

        info!(
            document_id = %document_id,
            anchor_id = %anchor_id,
            max_attempts = self.shared.policy.max_attempts,
            interval_secs = self.shared.policy.interval.as_secs(),
            "reconciler started"
        );
        true
    }

    pub async fn snapshot(&self, anchor_id: &str) -> Option<ReconcilerSnapshot> {
        self.shared
            .entries
            .lock()
            .await
            .get(anchor_id)
            .map(|e| e.snapshot.clone())
    }

    /// Snapshots of running reconcilers.
    pub async fn active(&self) -> Vec<ReconcilerSnapshot> {
        let mut running: Vec<_> = self
            .shared
            .entries
            .lock()
            .await
            .values()
            .filter(|e| e.snapshot.phase == ReconcilePhase::Running)
            .map(|e| e.snapshot.clone())
            .collect();
        running.sort_by_key(|s| s.started_at);
        running
    }

    /// Snapshots of every reconciler this registry has run.
    pub async fn all(&self) -> Vec<ReconcilerSnapshot> {
        let mut all: Vec<_> = self
            .shared
            .entries
            .lock()
            .await
            .values()
            .map(|e| e.snapshot.clone())
            .collect();
        all.sort_by_key(|s| s.started_at);
        all
    }

    /// Force-stop a running reconciler. The document is left as it is.
    pub async fn stop(&self, anchor_id: &str) -> bool {
        let mut entries = self.shared.entries.lock().await;
        let Some(entry) = entries.get_mut(anchor_id) else {
            return false;
        };
        if entry.snapshot.phase != ReconcilePhase::Running {
            return false;
        }
        if let Some(handle) = entry.handle.take() {
            handle.abort();
        }
        let document_id = entry.snapshot.document_id;
        finish(entry, ReconcilePhase::Stopped);
        drop(entries);

        warn!(document_id = %document_id, anchor_id, "reconciler stopped by operator");
        self.shared.events.emit(
            EventType::ReconcilerStopped,
            serde_json::json!({
                "document_id": document_id,
                "anchor_id": anchor_id,
            }),
        );
        true
    }

    /// Give a `pending` document a fresh polling budget.
    ///
    /// Returns `false` if a reconciler for its anchor is already running.
    pub async fn resume(&self, document_id: &DocumentId) -> Result<bool> {
        let anchor_id = {
            let conn = self.shared.db.lock().await;
            let doc = documents::get(&conn, document_id)?;
            if doc.anchor_status != AnchorStatus::Pending {
                return Err(PipelineError::InvalidState(format!(
                    "document {document_id} is {}, only pending documents can be reconciled",
                    doc.anchor_status
                )));
            }
            let anchor_id = doc.anchor_id.ok_or_else(|| {
                PipelineError::InvalidState(format!("document {document_id} has no anchor id"))
            })?;
            documents::clear_reconcile_exhausted(&conn, document_id)?;
            anchor_id
        };
        Ok(self.spawn(*document_id, anchor_id).await)
    }

    /// Start a reconciler for every `pending` document. Returns how many were started.
    pub async fn resume_all_pending(&self) -> Result<usize> {
        let pending = {
            let conn = self.shared.db.lock().await;
            documents::list_by_status(&conn, AnchorStatus::Pending)?
        };
        let mut started = 0;
        for doc in pending {
            let Some(anchor_id) = doc.anchor_id else {
                continue;
            };
            {
                let conn = self.shared.db.lock().await;
                documents::clear_reconcile_exhausted(&conn, &doc.id)?;
            }
            if self.spawn(doc.id, anchor_id).await {
                started += 1;
            }
        }
        Ok(started)
    }

    /// Wait until the reconciler for `anchor_id` leaves `Running`.
    pub async fn wait(&self, anchor_id: &str) -> Option<ReconcilerSnapshot> {
        let mut rx = {
            let entries = self.shared.entries.lock().await;
            entries.get(anchor_id)?.phase_tx.subscribe()
        };
        // Sender lives in the registry; an error here means it was dropped.
        let _ = rx.wait_for(|phase| *phase != ReconcilePhase::Running).await;
        self.snapshot(anchor_id).await
    }
}

fn finish(entry: &mut Entry, phase: ReconcilePhase) {
    entry.snapshot.phase = phase;
    entry.snapshot.finished_at = Some(scribe_db::unix_now());
    entry.handle = None;
    entry.phase_tx.send_replace(phase);
}

async fn run(shared: Arc<Shared>, document_id: DocumentId, anchor_id: AnchorId) {
    let policy = shared.policy;
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;

        let report = match shared.service.query_status(&anchor_id).await {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    document_id = %document_id,
                    anchor_id = %anchor_id,
                    attempt,
                    error = %e,
                    "status query failed"
                );
                record_attempt(&shared, &anchor_id, attempt, None).await;
                continue;
            }
        };
        record_attempt(&shared, &anchor_id, attempt, Some(report.status.clone())).await;

        let outcome = match report.remote_status() {
            RemoteStatus::Pending => {
                debug!(
                    document_id = %document_id,
                    anchor_id = %anchor_id,
                    attempt,
                    remote_status = %report.status,
                    "anchor still pending"
                );
                continue;
            }
            RemoteStatus::Confirmed => apply_confirmed(&shared, &document_id, &anchor_id, &report).await,
            RemoteStatus::Failed => apply_failed(&shared, &document_id, &anchor_id).await,
        };

        match outcome {
            Ok(phase) => {
                set_phase(&shared, &anchor_id, phase).await;
                return;
            }
            Err(e) => {
                // Row is still pending; the next attempt observes again.
                error!(
                    document_id = %document_id,
                    anchor_id = %anchor_id,
                    attempt,
                    error = %e,
                    "terminal status write failed"
                );
            }
        }
    }

    apply_exhausted(&shared, &document_id, &anchor_id).await;
    set_phase(&shared, &anchor_id, ReconcilePhase::Exhausted).await;
}

async fn record_attempt(shared: &Shared, anchor_id: &str, attempt: u32, remote_status: Option<String>) {
    if let Some(entry) = shared.entries.lock().await.get_mut(anchor_id) {
        entry.snapshot.attempts = attempt;
        if remote_status.is_some() {
            entry.snapshot.last_remote_status = remote_status;
        }
    }
}

async fn set_phase(shared: &Shared, anchor_id: &str, phase: ReconcilePhase) {
    if let Some(entry) = shared.entries.lock().await.get_mut(anchor_id) {
        finish(entry, phase);
    }
}

async fn apply_confirmed(
    shared: &Shared,
    document_id: &DocumentId,
    anchor_id: &str,
    report: &StatusReport,
) -> Result<ReconcilePhase> {
    let written = {
        let conn = shared.db.lock().await;
        documents::mark_confirmed(
            &conn,
            document_id,
            report.inscription_id.as_deref(),
            report.txid.as_deref(),
            report.height,
        )?
    };

    if written {
        info!(
            document_id = %document_id,
            anchor_id,
            txid = report.txid.as_deref().unwrap_or(""),
            inscription_id = report.inscription_id.as_deref().unwrap_or(""),
            "anchor confirmed"
        );
        shared.events.emit(
            EventType::AnchorConfirmed,
            serde_json::json!({
                "document_id": document_id,
                "anchor_id": anchor_id,
                "inscription_id": report.inscription_id,
                "txid": report.txid,
                "height": report.height,
            }),
        );
    } else {
        debug!(document_id = %document_id, anchor_id, "document no longer pending, confirmed write skipped");
    }
    Ok(ReconcilePhase::Confirmed)
}

async fn apply_failed(shared: &Shared, document_id: &DocumentId, anchor_id: &str) -> Result<ReconcilePhase> {
    let written = {
        let conn = shared.db.lock().await;
        documents::mark_failed(&conn, document_id)?
    };

    if written {
        error!(document_id = %document_id, anchor_id, "anchor failed");
        shared.events.emit(
            EventType::AnchorFailed,
            serde_json::json!({
                "document_id": document_id,
                "anchor_id": anchor_id,
            }),
        );
    } else {
        debug!(document_id = %document_id, anchor_id, "document no longer pending, failed write skipped");
    }
    Ok(ReconcilePhase::Failed)
}

async fn apply_exhausted(shared: &Shared, document_id: &DocumentId, anchor_id: &str) {
    let marked = {
        let conn = shared.db.lock().await;
        documents::mark_reconcile_exhausted(&conn, document_id, scribe_db::unix_now())
    };
    match marked {
        Ok(true) => {
            error!(
                document_id = %document_id,
                anchor_id,
                max_attempts = shared.policy.max_attempts,
                "polling budget exhausted, anchor still pending"
            );
            shared.events.emit(
                EventType::AnchorStalled,
                serde_json::json!({
                    "document_id": document_id,
                    "anchor_id": anchor_id,
                    "attempts": shared.policy.max_attempts,
                }),
            );
        }
        Ok(false) => {
            debug!(document_id = %document_id, anchor_id, "document no longer pending at exhaustion");
        }
        Err(e) => {
            error!(document_id = %document_id, anchor_id, error = %e, "failed to record exhaustion");
        }
    }
}
