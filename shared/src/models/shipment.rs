//! Outbound shipments

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::StatusFlow;

string_enum! {
    pub enum ShipmentStatus ("shipment status") {
        Pending => "pending",
        Shipped => "shipped",
        Delivered => "delivered",
        Cancelled => "cancelled",
    }
}

impl StatusFlow for ShipmentStatus {
    const ENTITY: &'static str = "shipment";

    fn can_transition_to(&self, next: Self) -> bool {
        use ShipmentStatus::*;
        matches!(
            (self, next),
            (Pending, Shipped) | (Pending, Cancelled) | (Shipped, Delivered)
        )
    }
}

/// Shipment header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Shipment {
    pub id: i64,
    pub shipment_number: String,
    pub from_location_id: i64,
    pub customer_name: Option<String>,
    pub shipping_address: Option<String>,
    pub tracking_number: Option<String>,
    pub ship_date: DateTime<Utc>,
    pub status: ShipmentStatus,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Shipment line with its FIFO cost of goods sold
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ShipmentLine {
    pub id: i64,
    pub shipment_id: i64,
    pub item_id: i64,
    pub quantity: Decimal,
    pub total_cost: Decimal,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipment_flow() {
        assert!(ShipmentStatus::Pending.can_transition_to(ShipmentStatus::Shipped));
        assert!(ShipmentStatus::Shipped.can_transition_to(ShipmentStatus::Delivered));
        assert!(!ShipmentStatus::Pending.can_transition_to(ShipmentStatus::Delivered));
        assert!(!ShipmentStatus::Shipped.can_transition_to(ShipmentStatus::Cancelled));
    }
}
