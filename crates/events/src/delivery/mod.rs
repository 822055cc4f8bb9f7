//! Outbound notification channels.
//!
//! The pipeline and the outbox relay only see [`NotificationChannel`]; the
//! concrete channel is picked at startup (SMTP when `SMTP_HOST` is set,
//! otherwise log-only).

use std::sync::Arc;

use async_trait::async_trait;

pub mod email;
pub mod log;
pub mod recording;

/// Shared handle to the configured channel.
pub type SharedChannel = Arc<dyn NotificationChannel>;

/// A plain-text message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Error type for delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The recipient or sender address could not be parsed.
    #[error("Invalid address: {0}")]
    Address(String),

    /// The transport refused or could not reach the server.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The message could not be assembled.
    #[error("Message build error: {0}")]
    Build(String),
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError>;
}
