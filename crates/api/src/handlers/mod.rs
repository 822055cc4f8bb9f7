pub mod extract;
pub mod intake;
pub mod notification;
pub mod proposal;
pub mod rfp;
pub mod vendor;
