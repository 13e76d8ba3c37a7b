//! Item master data and storage locations

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

string_enum! {
    /// Kind of storage area
    pub enum LocationType ("location type") {
        Warehouse => "warehouse",
        Production => "production",
        Shipping => "shipping",
        Buffer => "buffer",
        Transit => "transit",
    }
}

/// A stocked item, identified by its SKU
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Item {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub unit_of_measure: String,
    /// Standard cost, used when a receipt carries no price
    pub unit_cost: Decimal,
    pub price: Decimal,
    pub reorder_level: Decimal,
    pub reorder_quantity: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// An item with no reorder level configured never needs reordering
    pub fn needs_reorder(&self, on_hand: Decimal) -> bool {
        self.reorder_level > Decimal::ZERO && on_hand <= self.reorder_level
    }
}

/// A named storage area
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Location {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub location_type: LocationType,
    pub zone: Option<String>,
    pub capacity: Option<Decimal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Location {
    /// Utilisation in percent, `None` when no capacity is set
    pub fn capacity_percentage(&self, current: Decimal) -> Option<Decimal> {
        match self.capacity {
            Some(cap) if cap > Decimal::ZERO => current
                .checked_div(cap)
                .and_then(|ratio| ratio.checked_mul(Decimal::from(100))),
            Some(_) => Some(Decimal::ZERO),
            None => None,
        }
    }

    pub fn is_over_capacity(&self, current: Decimal) -> bool {
        matches!(self.capacity, Some(cap) if current > cap)
    }
}

/// On-hand quantity of one item at one location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryLevel {
    pub id: i64,
    pub item_id: i64,
    pub location_id: i64,
    pub quantity: Decimal,
    pub bin_location: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(capacity: Option<i64>) -> Location {
        Location {
            id: 1,
            code: "WH-A".into(),
            name: "Main warehouse".into(),
            location_type: LocationType::Warehouse,
            zone: None,
            capacity: capacity.map(Decimal::from),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn capacity_percentage_requires_capacity() {
        assert_eq!(location(None).capacity_percentage(Decimal::from(10)), None);
        assert_eq!(
            location(Some(200)).capacity_percentage(Decimal::from(50)),
            Some(Decimal::from(25))
        );
    }

    #[test]
    fn over_capacity_only_when_exceeded() {
        let loc = location(Some(100));
        assert!(!loc.is_over_capacity(Decimal::from(100)));
        assert!(loc.is_over_capacity(Decimal::from(101)));
        assert!(!location(None).is_over_capacity(Decimal::from(1_000_000)));
    }

    #[test]
    fn location_type_round_trips_through_text() {
        for ty in LocationType::ALL {
            assert_eq!(ty.as_str().parse::<LocationType>().unwrap(), *ty);
        }
        assert!("basement".parse::<LocationType>().is_err());
    }
}
