//! Business logic services for the Branch Stock Ledger

pub mod ledger;
pub mod stock;
pub mod transfer;

pub use stock::StockService;
pub use transfer::TransferService;
