//! Batch (lot) models for FIFO inventory

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::checked_product;

string_enum! {
    /// Lifecycle of a batch. Batches are never deleted.
    pub enum BatchStatus ("batch status") {
        Active => "active",
        Depleted => "depleted",
        Expired => "expired",
        Quarantine => "quarantine",
    }
}

string_enum! {
    /// Who owns the material in a batch
    pub enum OwnershipType ("ownership type") {
        Owned => "owned",
        /// Customer stock held on consignment
        Consignment => "consignment",
        /// Customer-supplied material processed for a fee
        Lohn => "lohn",
    }
}

impl OwnershipType {
    /// Only owned material counts toward inventory valuation
    pub fn counts_toward_valuation(&self) -> bool {
        matches!(self, OwnershipType::Owned)
    }
}

impl Default for OwnershipType {
    fn default() -> Self {
        OwnershipType::Owned
    }
}

string_enum! {
    /// Kind of batch mutation recorded in the audit trail
    pub enum BatchTransactionType ("batch transaction type") {
        Receipt => "receipt",
        Consumption => "consumption",
        Transfer => "transfer",
        TransferOut => "transfer_out",
        TransferIn => "transfer_in",
        Adjustment => "adjustment",
        Production => "production",
    }
}

/// A lot of one item at one location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Batch {
    pub id: i64,
    pub batch_number: String,
    pub item_id: i64,
    pub location_id: i64,
    pub receipt_id: Option<i64>,
    pub po_id: Option<i64>,
    pub production_order_number: Option<String>,
    pub external_process_id: Option<i64>,
    pub supplier_batch_number: Option<String>,
    pub bin_location: Option<String>,
    pub quantity_original: Decimal,
    pub quantity_available: Decimal,
    /// FIFO key
    pub received_at: DateTime<Utc>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub unit_cost: Decimal,
    pub ownership_type: OwnershipType,
    pub status: BatchStatus,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    /// A fresh active batch with no source links
    pub fn new(
        id: i64,
        batch_number: impl Into<String>,
        item_id: i64,
        location_id: i64,
        quantity: Decimal,
        unit_cost: Decimal,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            batch_number: batch_number.into(),
            item_id,
            location_id,
            receipt_id: None,
            po_id: None,
            production_order_number: None,
            external_process_id: None,
            supplier_batch_number: None,
            bin_location: None,
            quantity_original: quantity,
            quantity_available: quantity,
            received_at,
            expiry_date: None,
            unit_cost,
            ownership_type: OwnershipType::Owned,
            status: BatchStatus::Active,
            notes: None,
            created_by: None,
            created_at: received_at,
            updated_at: received_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expiry_date, Some(expiry) if expiry <= now)
    }

    pub fn is_depleted(&self) -> bool {
        self.quantity_available <= Decimal::ZERO
    }

    /// Whether FIFO selection may draw from this batch.
    ///
    /// With `exclude_expired` off, batches already swept to `expired` are
    /// drawn like active ones.
    pub fn is_consumable(&self, now: DateTime<Utc>, exclude_expired: bool) -> bool {
        let status_allows = match self.status {
            BatchStatus::Active => true,
            BatchStatus::Expired => !exclude_expired,
            _ => false,
        };
        status_allows
            && self.quantity_available > Decimal::ZERO
            && !(exclude_expired && self.is_expired(now))
    }

    /// Value of the remaining quantity at the batch's unit cost
    pub fn remaining_value(&self) -> LedgerResult<Decimal> {
        checked_product(self.quantity_available, self.unit_cost, "batch value")
    }

    /// Take `quantity` out of the batch, marking it depleted at zero
    pub fn consume(&mut self, quantity: Decimal) -> LedgerResult<()> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveQuantity(quantity));
        }
        if quantity > self.quantity_available {
            return Err(LedgerError::BatchOverdraw {
                batch_number: self.batch_number.clone(),
                requested: quantity,
                available: self.quantity_available,
            });
        }

        self.quantity_available -= quantity;
        if self.quantity_available == Decimal::ZERO {
            self.status = BatchStatus::Depleted;
        }
        Ok(())
    }

    /// Human readable origin of the batch
    pub fn source_description(&self) -> String {
        if let Some(po_id) = self.po_id {
            format!("Purchase order #{}", po_id)
        } else if let Some(order) = &self.production_order_number {
            format!("Production {}", order)
        } else if let Some(process_id) = self.external_process_id {
            format!("External process #{}", process_id)
        } else if self.receipt_id.is_some() {
            "Manual receipt".to_string()
        } else {
            "Unknown".to_string()
        }
    }
}

/// Append-only audit row for a batch mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BatchTransaction {
    pub id: i64,
    pub batch_id: i64,
    pub transaction_type: BatchTransactionType,
    /// Positive for additions, negative for consumption
    pub quantity: Decimal,
    pub reference_type: Option<String>,
    pub reference_id: Option<i64>,
    pub from_location_id: Option<i64>,
    pub to_location_id: Option<i64>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}
