//! Purchase orders and goods receipts

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::StatusFlow;

string_enum! {
    pub enum PurchaseOrderStatus ("purchase order status") {
        Draft => "draft",
        Submitted => "submitted",
        Partial => "partial",
        Received => "received",
        Cancelled => "cancelled",
    }
}

impl StatusFlow for PurchaseOrderStatus {
    const ENTITY: &'static str = "purchase order";

    fn can_transition_to(&self, next: Self) -> bool {
        use PurchaseOrderStatus::*;
        matches!(
            (self, next),
            (Draft, Submitted)
                | (Draft, Cancelled)
                | (Submitted, Partial)
                | (Submitted, Received)
                | (Submitted, Cancelled)
                | (Partial, Partial)
                | (Partial, Received)
                | (Partial, Cancelled)
        )
    }
}

impl PurchaseOrderStatus {
    /// Receipts may only be booked against submitted or partially received orders
    pub fn accepts_receipts(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Submitted | PurchaseOrderStatus::Partial)
    }

    /// Status after a receipt, given how much of each line has arrived
    pub fn after_receipt(lines: &[(Decimal, Decimal)]) -> Self {
        let all_received = lines.iter().all(|(ordered, received)| received >= ordered);
        let any_received = lines.iter().any(|(_, received)| *received > Decimal::ZERO);

        if all_received {
            PurchaseOrderStatus::Received
        } else if any_received {
            PurchaseOrderStatus::Partial
        } else {
            PurchaseOrderStatus::Submitted
        }
    }
}

/// Purchase order header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseOrder {
    pub id: i64,
    pub po_number: String,
    pub supplier_name: String,
    pub status: PurchaseOrderStatus,
    pub order_date: DateTime<Utc>,
    pub expected_date: Option<DateTime<Utc>>,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Purchase order line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseOrderLine {
    pub id: i64,
    pub po_id: i64,
    pub item_id: i64,
    pub quantity_ordered: Decimal,
    pub quantity_received: Decimal,
    pub unit_price: Decimal,
}

string_enum! {
    /// Where received goods come from
    pub enum ReceiptSource ("receipt source") {
        PurchaseOrder => "purchase_order",
        ExternalProcess => "external_process",
        Production => "production",
        Manual => "manual",
    }
}

/// Goods receipt header
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Receipt {
    pub id: i64,
    pub receipt_number: String,
    pub source_type: ReceiptSource,
    pub po_id: Option<i64>,
    pub external_process_id: Option<i64>,
    pub production_order_number: Option<String>,
    pub location_id: i64,
    pub received_at: DateTime<Utc>,
    pub received_by: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Goods receipt line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ReceiptLine {
    pub id: i64,
    pub receipt_id: i64,
    pub item_id: i64,
    pub quantity: Decimal,
    /// Damaged on arrival, never enters stock
    pub scrap_quantity: Decimal,
    pub batch_id: Option<i64>,
    pub notes: Option<String>,
}

impl ReceiptLine {
    pub fn good_quantity(&self) -> Decimal {
        self.quantity - self.scrap_quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn status_after_receipt() {
        assert_eq!(
            PurchaseOrderStatus::after_receipt(&[(d(10), d(10)), (d(5), d(6))]),
            PurchaseOrderStatus::Received
        );
        assert_eq!(
            PurchaseOrderStatus::after_receipt(&[(d(10), d(4)), (d(5), d(0))]),
            PurchaseOrderStatus::Partial
        );
        assert_eq!(
            PurchaseOrderStatus::after_receipt(&[(d(10), d(0))]),
            PurchaseOrderStatus::Submitted
        );
    }

    #[test]
    fn received_orders_cannot_be_cancelled() {
        assert!(PurchaseOrderStatus::Received
            .transition(PurchaseOrderStatus::Cancelled)
            .is_err());
        assert!(PurchaseOrderStatus::Draft
            .transition(PurchaseOrderStatus::Cancelled)
            .is_ok());
    }

    #[test]
    fn drafts_do_not_accept_receipts() {
        assert!(!PurchaseOrderStatus::Draft.accepts_receipts());
        assert!(PurchaseOrderStatus::Partial.accepts_receipts());
    }
}
