//! Domain models for the Branch Stock Ledger backend
//!
//! Re-exports the pure models from the shared crate; database row types
//! live next to the services that load them.

pub use shared::models::*;
