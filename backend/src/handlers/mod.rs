//! HTTP handlers for the Inventory ERP API

use serde::Deserialize;

pub mod adjustment;
pub mod batch;
pub mod bom;
pub mod external_process;
pub mod health;
pub mod inventory;
pub mod item;
pub mod production;
pub mod purchase_order;
pub mod receipt;
pub mod scrap;
pub mod shipment;
pub mod stock_movement;

pub use adjustment::*;
pub use batch::*;
pub use bom::*;
pub use external_process::*;
pub use health::*;
pub use inventory::*;
pub use item::*;
pub use production::*;
pub use purchase_order::*;
pub use receipt::*;
pub use scrap::*;
pub use shipment::*;
pub use stock_movement::*;

/// `?status=` filter shared by the document lists
#[derive(Debug, Deserialize)]
pub struct StatusQuery<S> {
    pub status: Option<S>,
}
