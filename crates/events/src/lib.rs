//! Procura event bus and outbound notification infrastructure.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, carrying [`ProcurementEvent`]s.
//! - [`delivery`]: the [`NotificationChannel`] seam with SMTP, log-only and
//!   recording implementations.
//! - [`OutboxRelay`]: background task draining the transactional outbox.

pub mod bus;
pub mod delivery;
pub mod outbox;

pub use bus::{EventBus, ProcurementEvent};
pub use delivery::email::{EmailConfig, EmailDelivery};
pub use delivery::log::LogChannel;
pub use delivery::recording::RecordingChannel;
pub use delivery::{DeliveryError, NotificationChannel, OutgoingMessage, SharedChannel};
pub use outbox::OutboxRelay;
