//! Log-only channel used when SMTP is not configured.

use async_trait::async_trait;

use super::{DeliveryError, NotificationChannel, OutgoingMessage};

#[derive(Debug, Default)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body_len = message.body.len(),
            "SMTP not configured; notification logged only"
        );
        Ok(())
    }
}
