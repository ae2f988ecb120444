//! Shared types and ledger rules for the tea trading platform
//!
//! This crate contains the domain models, the stock adjustment arithmetic and
//! the shipment status table shared between the backend and the browser
//! (via WASM).

pub mod ledger;
pub mod models;
pub mod validation;

pub use ledger::*;
pub use models::*;
pub use validation::*;
