//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! Every committed state change publishes a [`ProcurementEvent`]. The bus is
//! shared via `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use procura_core::types::DbId;

/// Event type names.
pub mod event_types {
    pub const RFP_CREATED: &str = "rfp.created";
    pub const RFP_UPDATED: &str = "rfp.updated";
    pub const RFP_DISPATCHED: &str = "rfp.dispatched";
    pub const RFP_CLOSED: &str = "rfp.closed";
    pub const RFP_AWARDED: &str = "rfp.awarded";
    pub const PROPOSAL_RECEIVED: &str = "proposal.received";
    pub const PROPOSAL_PARSED: &str = "proposal.parsed";
    pub const PROPOSAL_EVALUATED: &str = "proposal.evaluated";
    pub const PROPOSAL_ACCEPTED: &str = "proposal.accepted";
    pub const PROPOSAL_DELETED: &str = "proposal.deleted";
}

// ---------------------------------------------------------------------------
// ProcurementEvent
// ---------------------------------------------------------------------------

/// A domain event that was committed to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcurementEvent {
    /// Dot-separated event name, e.g. `"rfp.awarded"`.
    pub event_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ProcurementEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            entity_type: None,
            entity_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<ProcurementEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest messages are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers; dropped if there are none.
    pub fn publish(&self, event: ProcurementEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProcurementEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Write every event to the tracing log until the bus is dropped.
pub async fn log_events(mut rx: broadcast::Receiver<ProcurementEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => tracing::info!(
                event_type = %event.event_type,
                entity_type = event.entity_type.as_deref().unwrap_or("-"),
                entity_id = event.entity_id,
                payload = %event.payload,
                "Procurement event"
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
