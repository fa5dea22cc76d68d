//! Scriptable in-memory anchoring service.
//!
//! Chosen explicitly with `anchor.backend = "simulated"`. Every submission
//! receives an id `sim-anchor-<n>` and a copy of the current poll script.
//! Each status query pops the next scripted entry; the last entry repeats
//! forever.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{AnchorService, InscriptionRequest, StatusReport, SubmitReceipt};
use crate::{AnchorError, Result};

/// Prefix of simulated anchor ids.
pub const SIMULATED_ANCHOR_PREFIX: &str = "sim-anchor-";

/// One scripted answer to a status query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptedPoll {
    Status {
        status: String,
        inscription_id: Option<String>,
        txid: Option<String>,
        height: Option<u64>,
    },
    /// `completed`, with an inscription id and txid derived from the anchor
    /// id so that every anchor confirms with its own identifiers.
    Inscribed,
    /// The query fails as if the service timed out.
    Error,
}

impl ScriptedPoll {
    pub fn pending() -> Self {
        Self::raw("pending")
    }

    pub fn confirmed(txid: &str) -> Self {
        ScriptedPoll::Status {
            status: "confirmed".to_string(),
            inscription_id: None,
            txid: Some(txid.to_string()),
            height: None,
        }
    }

    pub fn failed() -> Self {
        Self::raw("failed")
    }

    /// Any status word with no identifiers.
    pub fn raw(status: &str) -> Self {
        ScriptedPoll::Status {
            status: status.to_string(),
            inscription_id: None,
            txid: None,
            height: None,
        }
    }
}

struct Inner {
    script: Vec<ScriptedPoll>,
    queues: HashMap<String, VecDeque<ScriptedPoll>>,
    requests: Vec<InscriptionRequest>,
}

pub struct SimulatedAnchorService {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    fail_submit: AtomicBool,
    submits: AtomicUsize,
    polls: AtomicUsize,
}

impl Default for SimulatedAnchorService {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAnchorService {
    /// A service that reports `pending` once, then `confirmed`.
    pub fn new() -> Self {
        Self::with_script(vec![ScriptedPoll::pending(), ScriptedPoll::Inscribed])
    }

    pub fn with_script(script: Vec<ScriptedPoll>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                script,
                queues: HashMap::new(),
                requests: Vec::new(),
            }),
            next_id: AtomicU64::new(1),
            fail_submit: AtomicBool::new(false),
            submits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        }
    }

    /// Replace the script handed to future submissions.
    pub fn set_script(&self, script: Vec<ScriptedPoll>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.script = script;
        }
    }

    /// Make submissions fail with `Unavailable`.
    pub fn set_submit_failure(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    pub fn submit_calls(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.submit_calls() + self.poll_calls()
    }

    /// Requests accepted so far, oldest first.
    pub fn requests(&self) -> Vec<InscriptionRequest> {
        self.inner
            .lock()
            .map(|inner| inner.requests.clone())
            .unwrap_or_default()
    }
}

fn poisoned() -> AnchorError {
    AnchorError::Unavailable("simulated service lock poisoned".to_string())
}

#[async_trait]
impl AnchorService for SimulatedAnchorService {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn submit(&self, request: &InscriptionRequest) -> Result<SubmitReceipt> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(AnchorError::Unavailable("simulated submit failure".to_string()));
        }

        let id = format!(
            "{SIMULATED_ANCHOR_PREFIX}{}",
            self.next_id.fetch_add(1, Ordering::SeqCst)
        );
        let mut inner = self.inner.lock().map_err(|_| poisoned())?;
        let queue: VecDeque<ScriptedPoll> = inner.script.iter().cloned().collect();
        inner.queues.insert(id.clone(), queue);
        inner.requests.push(request.clone());

        Ok(SubmitReceipt {
            id,
            status: "pending".to_string(),
        })
    }

    async fn query_status(&self, anchor_id: &str) -> Result<StatusReport> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = {
            let mut inner = self
                .inner
                .lock()
                .map_err(|_| AnchorError::PollingTransient("lock poisoned".to_string()))?;
            let queue = inner
                .queues
                .get_mut(anchor_id)
                .ok_or_else(|| AnchorError::PollingTransient(format!("unknown anchor {anchor_id}")))?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };

        match next {
            Some(ScriptedPoll::Status {
                status,
                inscription_id,
                txid,
                height,
            }) => Ok(StatusReport {
                id: anchor_id.to_string(),
                status,
                inscription_id,
                txid,
                height,
            }),
            Some(ScriptedPoll::Inscribed) => Ok(StatusReport {
                id: anchor_id.to_string(),
                status: "completed".to_string(),
                inscription_id: Some(format!("{anchor_id}i0")),
                txid: Some(format!("{anchor_id}-tx")),
                height: None,
            }),
            Some(ScriptedPoll::Error) => Err(AnchorError::PollingTransient(
                "simulated status timeout".to_string(),
            )),
            None => Ok(StatusReport {
                id: anchor_id.to_string(),
                status: "pending".to_string(),
                inscription_id: None,
                txid: None,
                height: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RemoteStatus;

    fn request() -> InscriptionRequest {
        InscriptionRequest {
            files: vec![],
            low_postage: true,
            receive_address: String::new(),
            fee: 10,
        }
    }

    #[tokio::test]
    async fn test_script_last_entry_repeats() {
        let service = SimulatedAnchorService::with_script(vec![
            ScriptedPoll::pending(),
            ScriptedPoll::confirmed("abc123"),
        ]);
        let receipt = service.submit(&request()).await.expect("submit");
        assert_eq!(receipt.id, "sim-anchor-1");

        let first = service.query_status(&receipt.id).await.expect("poll");
        assert_eq!(first.remote_status(), RemoteStatus::Pending);
        for _ in 0..3 {
            let report = service.query_status(&receipt.id).await.expect("poll");
            assert_eq!(report.remote_status(), RemoteStatus::Confirmed);
            assert_eq!(report.txid.as_deref(), Some("abc123"));
        }
        assert_eq!(service.poll_calls(), 4);
    }

    #[tokio::test]
    async fn test_each_anchor_has_its_own_cursor() {
        let service = SimulatedAnchorService::with_script(vec![
            ScriptedPoll::pending(),
            ScriptedPoll::failed(),
        ]);
        let a = service.submit(&request()).await.expect("submit").id;
        let b = service.submit(&request()).await.expect("submit").id;
        assert_ne!(a, b);

        service.query_status(&a).await.expect("poll");
        let b_first = service.query_status(&b).await.expect("poll");
        assert_eq!(b_first.remote_status(), RemoteStatus::Pending);
    }

    #[tokio::test]
    async fn test_default_script_inscribes_per_anchor() {
        let service = SimulatedAnchorService::new();
        let a = service.submit(&request()).await.expect("submit").id;
        let b = service.submit(&request()).await.expect("submit").id;

        for id in [&a, &b] {
            let first = service.query_status(id).await.expect("poll");
            assert_eq!(first.remote_status(), RemoteStatus::Pending);
        }
        let done_a = service.query_status(&a).await.expect("poll");
        let done_b = service.query_status(&b).await.expect("poll");
        assert_eq!(done_a.remote_status(), RemoteStatus::Confirmed);
        assert_eq!(done_a.inscription_id.as_deref(), Some("sim-anchor-1i0"));
        assert_eq!(done_b.inscription_id.as_deref(), Some("sim-anchor-2i0"));
        assert_ne!(done_a.txid, done_b.txid);
    }

    #[tokio::test]
    async fn test_submit_failure_switch() {
        let service = SimulatedAnchorService::new();
        service.set_submit_failure(true);
        assert!(matches!(
            service.submit(&request()).await,
            Err(AnchorError::Unavailable(_))
        ));
        assert!(service.requests().is_empty());
        assert_eq!(service.submit_calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_error_and_unknown_anchor() {
        let service = SimulatedAnchorService::with_script(vec![ScriptedPoll::Error, ScriptedPoll::pending()]);
        let id = service.submit(&request()).await.expect("submit").id;
        assert!(matches!(
            service.query_status(&id).await,
            Err(AnchorError::PollingTransient(_))
        ));
        assert!(service.query_status(&id).await.is_ok());
        assert!(matches!(
            service.query_status("nope").await,
            Err(AnchorError::PollingTransient(_))
        ));
    }
}
