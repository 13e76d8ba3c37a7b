//! Stock movements between locations

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

string_enum! {
    pub enum MovementType ("movement type") {
        Transfer => "transfer",
        Relocation => "relocation",
        Rebalance => "rebalance",
    }
}

impl Default for MovementType {
    fn default() -> Self {
        MovementType::Transfer
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: i64,
    pub movement_number: String,
    pub item_id: i64,
    pub from_location_id: i64,
    pub to_location_id: i64,
    pub quantity: Decimal,
    pub movement_type: MovementType,
    pub reason: Option<String>,
    pub moved_by: Option<i64>,
    pub moved_at: DateTime<Utc>,
    pub notes: Option<String>,
}
