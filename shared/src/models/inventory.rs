//! Item-level inventory movements

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

string_enum! {
    /// Inventory transaction types
    pub enum InventoryTransactionType ("inventory transaction type") {
        Receipt => "receipt",
        Shipment => "shipment",
        Scrap => "scrap",
        ProcessOut => "process_out",
        TransferOut => "transfer_out",
        TransferIn => "transfer_in",
        ProductionIn => "production_in",
        ProductionOut => "production_out",
        Adjustment => "adjustment",
    }
}

string_enum! {
    /// Document that caused a stock mutation
    pub enum ReferenceType ("reference type") {
        Receipt => "receipt",
        Shipment => "shipment",
        Scrap => "scrap",
        ProductionOrder => "production_order",
        ExternalProcess => "external_process",
        StockMovement => "stock_movement",
        Adjustment => "adjustment",
    }
}

/// Pointer from a ledger row back to the document that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub reference_type: ReferenceType,
    pub reference_id: i64,
}

impl DocumentRef {
    pub fn new(reference_type: ReferenceType, reference_id: i64) -> Self {
        Self {
            reference_type,
            reference_id,
        }
    }
}

/// Inventory transaction record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryTransaction {
    pub id: i64,
    pub item_id: i64,
    pub location_id: i64,
    pub transaction_type: InventoryTransactionType,
    /// Signed: positive adds stock, negative removes it
    pub quantity: Decimal,
    pub reference_type: Option<String>,
    pub reference_id: Option<i64>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}
