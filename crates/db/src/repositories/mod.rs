pub mod outbox_repo;
pub mod proposal_repo;
pub mod rfp_repo;
pub mod vendor_repo;

pub use outbox_repo::OutboxRepo;
pub use proposal_repo::ProposalRepo;
pub use rfp_repo::RfpRepo;
pub use vendor_repo::VendorRepo;
