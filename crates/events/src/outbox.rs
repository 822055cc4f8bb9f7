//! Outbox relay.
//!
//! [`OutboxRelay`] runs as a background task, periodically draining pending
//! rows from the transactional outbox through the configured
//! [`NotificationChannel`]. A failed send is retried on later ticks until it
//! has been attempted [`MAX_ATTEMPTS`] times, then it is marked `failed`.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use procura_db::models::outbox::OutboundNotification;
use procura_db::{SharedStore, StoreError};

use crate::delivery::{OutgoingMessage, SharedChannel};

/// Attempts before a notification is given up on.
pub const MAX_ATTEMPTS: i32 = 5;

/// Rows fetched per drain.
const BATCH_SIZE: i64 = 50;

/// Default tick when none is configured.
pub const DEFAULT_RELAY_INTERVAL: Duration = Duration::from_secs(10);

/// Counts from one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    pub sent: usize,
    pub failed: usize,
}

pub struct OutboxRelay {
    store: SharedStore,
    channel: SharedChannel,
    interval: Duration,
}

impl OutboxRelay {
    pub fn new(store: SharedStore, channel: SharedChannel, interval: Duration) -> Self {
        Self {
            store,
            channel,
            interval,
        }
    }

    /// Run until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Outbox relay cancelled");
                    break;
                }
                _ = interval.tick() => {
                    match self.drain_once().await {
                        Ok(report) if report.sent + report.failed > 0 => {
                            tracing::info!(sent = report.sent, failed = report.failed, "Outbox drained");
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Failed to drain outbox"),
                    }
                }
            }
        }
    }

    /// Send every pending notification once.
    pub async fn drain_once(&self) -> Result<RelayReport, StoreError> {
        let pending = self.store.pending_notifications(BATCH_SIZE, MAX_ATTEMPTS).await?;
        let mut report = RelayReport::default();

        for row in &pending {
            if self.deliver(row).await? {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
        }
        Ok(report)
    }

    async fn deliver(&self, row: &OutboundNotification) -> Result<bool, StoreError> {
        let message = OutgoingMessage {
            to: row.recipient.clone(),
            subject: row.subject.clone(),
            body: row.body.clone(),
        };
        match self.channel.send(&message).await {
            Ok(()) => {
                self.store.mark_notification_sent(row.id).await?;
                tracing::debug!(notification_id = row.id, kind = %row.kind, "Outbox notification sent");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(
                    notification_id = row.id,
                    attempt = row.attempts + 1,
                    channel = self.channel.name(),
                    error = %e,
                    "Outbox delivery failed"
                );
                self.store
                    .mark_notification_failed(row.id, &e.to_string(), MAX_ATTEMPTS)
                    .await?;
                Ok(false)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use procura_db::models::outbox::{delivery_status, kind, NewNotification};
    use procura_db::{EntityStore, MemoryStore};

    use super::*;
    use crate::delivery::recording::RecordingChannel;

    fn note(to: &str) -> NewNotification {
        NewNotification {
            kind: kind::PROPOSAL_ACCEPTED.into(),
            recipient: to.into(),
            subject: "Your proposal was accepted".into(),
            body: "Details inside.".into(),
            rfp_id: None,
            proposal_id: None,
        }
    }

    #[tokio::test]
    async fn drains_pending_rows() {
        let store = Arc::new(MemoryStore::new());
        let channel = Arc::new(RecordingChannel::new());
        store
            .enqueue_notifications(&[note("a@acme.com"), note("b@acme.com")])
            .await
            .unwrap();

        let relay = OutboxRelay::new(store.clone(), channel.clone(), DEFAULT_RELAY_INTERVAL);
        let report = relay.drain_once().await.unwrap();

        assert_eq!(report, RelayReport { sent: 2, failed: 0 });
        assert_eq!(channel.sent().await.len(), 2);
        assert!(store.pending_notifications(10, MAX_ATTEMPTS).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retries_then_gives_up() {
        let store = Arc::new(MemoryStore::new());
        let channel = Arc::new(RecordingChannel::new());
        channel.fail_for("down@acme.com").await;
        store.enqueue_notifications(&[note("down@acme.com")]).await.unwrap();

        let relay = OutboxRelay::new(store.clone(), channel.clone(), DEFAULT_RELAY_INTERVAL);
        for _ in 0..MAX_ATTEMPTS {
            assert_eq!(relay.drain_once().await.unwrap().failed, 1);
        }
        assert_eq!(relay.drain_once().await.unwrap(), RelayReport::default());

        let rows = store.list_notifications(10).await.unwrap();
        assert_eq!(rows[0].status, delivery_status::FAILED);
        assert_eq!(rows[0].attempts, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let store = Arc::new(MemoryStore::new());
        let relay = OutboxRelay::new(
            store,
            Arc::new(RecordingChannel::new()),
            Duration::from_millis(10),
        );
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { relay.run(token).await });
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("relay should stop")
            .unwrap();
    }
}
