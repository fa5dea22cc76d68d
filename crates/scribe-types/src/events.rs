//! Pipeline event types.
//!
//! Events are broadcast to in-process subscribers (the daemon forwards
//! them to logs; tests assert on them).

use serde::{Deserialize, Serialize};

/// Envelope for all pipeline events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    /// Unix timestamp.
    pub timestamp: u64,
    pub payload: serde_json::Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DocumentIngested,
    AnchorSubmitted,
    AnchorSubmitFailed,
    AnchorConfirmed,
    AnchorFailed,
    /// Polling budget spent while the anchor was still pending.
    AnchorStalled,
    ReconcilerStopped,
}
