//! Stock adjustments from cycle counts and corrections

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A signed correction of the stock of one item at one location.
///
/// A gain opens a batch at the item's standard cost; a loss is drawn from
/// the oldest batches like any other consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockAdjustment {
    pub id: i64,
    pub adjustment_number: String,
    pub item_id: i64,
    pub location_id: i64,
    /// Positive adds stock, negative removes it
    pub quantity_change: Decimal,
    /// Signed value booked: cost of the new batch or of the batches drawn
    pub total_cost: Decimal,
    /// Batch opened by a gain
    pub batch_id: Option<i64>,
    pub reason: String,
    pub adjusted_by: Option<i64>,
    pub notes: Option<String>,
    pub adjusted_at: DateTime<Utc>,
}

impl StockAdjustment {
    pub fn is_gain(&self) -> bool {
        self.quantity_change > Decimal::ZERO
    }
}
