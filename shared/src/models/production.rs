//! Bills of materials and production orders

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::StatusFlow;
use crate::ledger::costing::ProductionCost;

string_enum! {
    pub enum BomStatus ("BOM status") {
        Draft => "draft",
        Active => "active",
        Obsolete => "obsolete",
    }
}

impl StatusFlow for BomStatus {
    const ENTITY: &'static str = "bill of materials";

    fn can_transition_to(&self, next: Self) -> bool {
        use BomStatus::*;
        matches!((self, next), (Draft, Active) | (Active, Obsolete) | (Draft, Obsolete))
    }
}

impl BomStatus {
    /// Only drafts may have their component list changed
    pub fn is_editable(&self) -> bool {
        matches!(self, BomStatus::Draft)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BillOfMaterials {
    pub id: i64,
    pub bom_number: String,
    pub finished_item_id: i64,
    pub version: String,
    pub status: BomStatus,
    pub production_time_minutes: Option<i32>,
    /// Expected waste in percent (0-100)
    pub scrap_factor: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BomComponent {
    pub id: i64,
    pub bom_id: i64,
    pub component_item_id: i64,
    /// Quantity per finished unit
    pub quantity: Decimal,
    pub unit_of_measure: Option<String>,
    pub sequence: i32,
    pub is_optional: bool,
    pub notes: Option<String>,
}

/// A component requirement, from a BOM or a manual list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ComponentRequirement {
    pub item_id: i64,
    pub quantity_per_unit: Decimal,
    pub is_optional: bool,
}

impl From<&BomComponent> for ComponentRequirement {
    fn from(c: &BomComponent) -> Self {
        Self {
            item_id: c.component_item_id,
            quantity_per_unit: c.quantity,
            is_optional: c.is_optional,
        }
    }
}

string_enum! {
    pub enum ProductionStatus ("production status") {
        Draft => "draft",
        Released => "released",
        InProgress => "in_progress",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

impl StatusFlow for ProductionStatus {
    const ENTITY: &'static str = "production order";

    fn can_transition_to(&self, next: Self) -> bool {
        use ProductionStatus::*;
        matches!(
            (self, next),
            (Draft, Released)
                | (Draft, InProgress)
                | (Released, InProgress)
                | (Draft, Cancelled)
                | (Released, Cancelled)
                | (InProgress, Completed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductionOrder {
    pub id: i64,
    pub order_number: String,
    pub finished_item_id: i64,
    /// `None` for orders with a manual component list
    pub bom_id: Option<i64>,
    pub location_id: i64,
    pub quantity_ordered: Decimal,
    pub quantity_produced: Decimal,
    pub quantity_scrapped: Decimal,
    pub status: ProductionStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub actual_start_date: Option<DateTime<Utc>>,
    pub actual_completion_date: Option<DateTime<Utc>>,
    pub material_cost: Decimal,
    pub labor_cost: Decimal,
    pub overhead_cost: Decimal,
    pub total_cost: Decimal,
    /// Cost already carried into finished batches
    pub cost_absorbed: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductionOrder {
    /// Units not yet reported as produced or scrapped
    pub fn remaining_quantity(&self) -> Decimal {
        (self.quantity_ordered - self.quantity_produced - self.quantity_scrapped).max(Decimal::ZERO)
    }

    pub fn completion_percentage(&self) -> Decimal {
        if self.quantity_ordered <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.quantity_produced / self.quantity_ordered * Decimal::from(100)
    }

    pub fn production_cost(&self) -> ProductionCost {
        ProductionCost {
            material_cost: self.material_cost,
            labor_cost: self.labor_cost,
            overhead_cost: self.overhead_cost,
        }
    }
}

/// Link between a production order and a batch it consumed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductionConsumption {
    pub id: i64,
    pub production_order_id: i64,
    pub component_item_id: i64,
    pub batch_id: i64,
    pub quantity_consumed: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub consumed_at: DateTime<Utc>,
    pub consumed_by: Option<i64>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_cannot_be_cancelled_once_started() {
        assert!(ProductionStatus::InProgress
            .transition(ProductionStatus::Cancelled)
            .is_err());
        assert!(ProductionStatus::Released
            .transition(ProductionStatus::Cancelled)
            .is_ok());
    }

    #[test]
    fn only_started_orders_complete() {
        assert!(!ProductionStatus::Released.can_transition_to(ProductionStatus::Completed));
        assert!(ProductionStatus::InProgress.can_transition_to(ProductionStatus::Completed));
    }

    #[test]
    fn bom_lifecycle() {
        assert!(BomStatus::Draft.is_editable());
        assert!(!BomStatus::Active.is_editable());
        assert!(BomStatus::Obsolete.transition(BomStatus::Active).is_err());
    }
}
