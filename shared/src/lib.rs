//! Shared types and ledger logic for the Inventory ERP
//!
//! This crate holds everything that does not touch the database: domain
//! models and status machines, the FIFO batch selector, production cost
//! roll-up and input validation. The backend and the WASM client both build
//! on it.

pub mod error;
pub mod ledger;
pub mod models;
pub mod numbering;
pub mod types;
pub mod validation;

pub use error::*;
pub use ledger::*;
pub use models::*;
pub use numbering::*;
pub use types::*;
pub use validation::*;
