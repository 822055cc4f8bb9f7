//! Transactional outbox rows for outbound notifications.

use serde::Serialize;
use sqlx::FromRow;

use procura_core::types::{DbId, Timestamp};

/// Notification kinds.
pub mod kind {
    pub const RFP_DISPATCH: &str = "rfp_dispatch";
    pub const PROPOSAL_ACCEPTED: &str = "proposal_accepted";
}

/// Delivery states.
pub mod delivery_status {
    pub const PENDING: &str = "pending";
    pub const SENT: &str = "sent";
    pub const FAILED: &str = "failed";
}

/// A row from the `outbound_notifications` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct OutboundNotification {
    pub id: DbId,
    pub kind: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub rfp_id: Option<DbId>,
    pub proposal_id: Option<DbId>,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub sent_at: Option<Timestamp>,
}

/// Insert payload for the outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub kind: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub rfp_id: Option<DbId>,
    pub proposal_id: Option<DbId>,
}
