//! Shared types and domain logic for the Branch Stock Ledger
//!
//! This crate contains the pure, database-free parts of the system: the
//! chain recalculation algorithm, movement kind arithmetic, and input
//! validation. The backend builds its persistence and HTTP layers on top.

pub mod chain;
pub mod models;
pub mod types;
pub mod validation;

pub use chain::*;
pub use models::*;
pub use types::*;
pub use validation::*;
