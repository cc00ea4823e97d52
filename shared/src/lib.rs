//! Shared types and models for the Restaurant Operations Platform
//!
//! This crate contains the domain models, the order-status state machine,
//! the shift issuance ledger, and the stock deduction engine. It has no
//! database or HTTP dependencies, so the core invariants can be exercised
//! without a running backend.

pub mod deduction;
pub mod models;
pub mod types;
pub mod validation;

pub use deduction::*;
pub use models::*;
pub use types::*;
pub use validation::*;
