pub mod outbox;
pub mod proposal;
pub mod rfp;
pub mod vendor;
