//! Procurement pipeline services.
//!
//! Orchestrates the pure rules in `procura-core` against the entity store,
//! the extraction capability and the notification channel:
//!
//! - [`extractor::StructuredExtractor`]: text to typed drafts and fields.
//! - [`lifecycle::Lifecycle`]: the only component that changes a status.
//! - [`rfp::RfpService`], [`vendor::VendorService`],
//!   [`proposal::ProposalService`]: entity operations.
//! - [`evaluation::EvaluationService`]: scores and commits rankings.
//! - [`dispatch::DispatchCoordinator`]: sends RFPs and awards them.
//! - [`intake::IntakeBridge`]: turns inbound mail into proposals.

pub mod capability;
pub mod dispatch;
pub mod evaluation;
pub mod extractor;
pub mod intake;
pub mod lifecycle;
pub mod notices;
pub mod proposal;
pub mod rfp;
pub mod timeout;
pub mod vendor;

pub use capability::{ExtractionCapability, OllamaCapability, RuleCapability, SharedCapability};
pub use dispatch::{DispatchCoordinator, DispatchOutcome, VendorDelivery};
pub use evaluation::EvaluationService;
pub use extractor::StructuredExtractor;
pub use intake::{BufferedMailbox, InboundMailbox, InboundMessage, IntakeBridge, IntakeReport};
pub use lifecycle::Lifecycle;
pub use proposal::ProposalService;
pub use rfp::RfpService;
pub use vendor::VendorService;
