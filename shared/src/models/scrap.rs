//! Scrap records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

string_enum! {
    /// Where scrapped material was found
    pub enum ScrapSource ("scrap source") {
        Receipt => "receipt",
        Warehouse => "warehouse",
        Production => "production",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Scrap {
    pub id: i64,
    pub scrap_number: String,
    pub item_id: i64,
    pub location_id: i64,
    pub quantity: Decimal,
    /// FIFO cost written off; zero for scrap that never entered stock
    pub total_cost: Decimal,
    pub reason: Option<String>,
    pub source_type: ScrapSource,
    pub source_id: Option<i64>,
    pub scrapped_by: Option<i64>,
    pub notes: Option<String>,
    pub scrap_date: DateTime<Utc>,
}
