//! Procura domain core.
//!
//! Pure, synchronous building blocks shared by the store, pipeline and API
//! crates: the error taxonomy, lifecycle transition tables, the requirement
//! schema, extraction normalization, the evaluation engine and the intake
//! helpers. Nothing in this crate performs I/O.

pub mod error;
pub mod evaluation;
pub mod extraction;
pub mod hashing;
pub mod intake;
pub mod lifecycle;
pub mod pagination;
pub mod requirements;
pub mod types;
pub mod vendor;
