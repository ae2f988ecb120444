//! HTTP handlers for the tea ledger API

pub mod assignment;
pub mod health;
pub mod history;
pub mod shipment;
pub mod stock;

pub use assignment::*;
pub use health::*;
pub use history::*;
pub use shipment::*;
pub use stock::*;
