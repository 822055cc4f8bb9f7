//! In-process channel that records every message.
//!
//! Used by tests and by `STORE_BACKEND=memory` demos. Recipients registered
//! with [`RecordingChannel::fail_for`] are rejected with a transport error.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{DeliveryError, NotificationChannel, OutgoingMessage};

#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<OutgoingMessage>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject future messages to `recipient`.
    pub async fn fail_for(&self, recipient: &str) {
        self.failing.lock().await.insert(recipient.to_lowercase());
    }

    /// Accept messages to `recipient` again.
    pub async fn recover(&self, recipient: &str) {
        self.failing.lock().await.remove(&recipient.to_lowercase());
    }

    pub async fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        if self.failing.lock().await.contains(&message.to.to_lowercase()) {
            return Err(DeliveryError::Transport(format!(
                "recipient {} rejected",
                message.to
            )));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}
