//! Database models for the Inventory ERP
//!
//! Re-exports models from the shared crate and adds backend-specific models

pub use shared::models::*;

use serde::Deserialize;

/// Common `?item_id=&location_id=` filter
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StockFilter {
    pub item_id: Option<i64>,
    pub location_id: Option<i64>,
}
