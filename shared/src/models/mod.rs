//! Domain models for the Branch Stock Ledger

mod movement;
mod transfer;

pub use movement::*;
pub use transfer::*;
