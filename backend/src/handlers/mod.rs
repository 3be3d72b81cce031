//! HTTP handlers for the Branch Stock Ledger

pub mod health;
pub mod stock;
pub mod transfer;

pub use health::*;
pub use stock::*;
pub use transfer::*;
