//! Domain models for the tea ledger

mod history;
mod shipment;
mod stock;
mod user;

pub use history::*;
pub use shipment::*;
pub use stock::*;
pub use user::*;
