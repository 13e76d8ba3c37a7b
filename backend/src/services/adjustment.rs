//! Stock adjustments
//!
//! A gain opens a batch at the item's cost so the batch ledger keeps matching
//! the level. A loss is drawn from the oldest batches.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use validator::Validate;

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    BatchTransactionType, DocumentRef, InventoryTransactionType, ReferenceType, StockAdjustment,
    StockFilter,
};
use crate::services::batch::{consumed_cost, BatchService, ConsumedBatch, NewBatch};
use crate::services::ledger::{self, StockPosting};
use shared::{checked_product, round_cost, validate_adjustment_quantity, DocumentKind, FifoOptions};

const ADJUSTMENT_COLUMNS: &str = "id, adjustment_number, item_id, location_id, quantity_change, \
     total_cost, batch_id, reason, adjusted_by, notes, adjusted_at";

#[derive(Clone)]
pub struct AdjustmentService {
    db: PgPool,
    ledger: LedgerConfig,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAdjustmentInput {
    pub item_id: i64,
    pub location_id: i64,
    /// Positive for a gain, negative for a loss
    pub quantity_change: Decimal,
    /// Cost of a gain, defaults to the item cost
    pub unit_cost: Option<Decimal>,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    pub bin_location: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdjustmentWithBatches {
    #[serde(flatten)]
    pub adjustment: StockAdjustment,
    /// Batches drawn by a loss
    pub batches: Vec<ConsumedBatch>,
}

impl AdjustmentService {
    pub fn new(db: PgPool, ledger: LedgerConfig) -> Self {
        Self { db, ledger }
    }

    pub async fn create(
        &self,
        input: CreateAdjustmentInput,
        actor: Option<i64>,
    ) -> AppResult<AdjustmentWithBatches> {
        input.validate()?;
        validate_adjustment_quantity(input.quantity_change)
            .map_err(|msg| AppError::validation("quantity_change", msg))?;
        if matches!(input.unit_cost, Some(c) if c < Decimal::ZERO) {
            return Err(AppError::validation("unit_cost", "Cost cannot be negative"));
        }

        let mut tx = self.db.begin().await?;

        let item_cost: Decimal = sqlx::query_scalar("SELECT unit_cost FROM items WHERE id = $1")
            .bind(input.item_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {}", input.item_id)))?;
        ledger::ensure_exists(&mut tx, "locations", input.location_id, "Location").await?;

        let adjustment_number = ledger::next_document_number(&mut tx, DocumentKind::Adjustment).await?;
        let sql = format!(
            r#"
            INSERT INTO stock_adjustments (adjustment_number, item_id, location_id, quantity_change,
                                           reason, adjusted_by, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ADJUSTMENT_COLUMNS}
            "#
        );
        let adjustment = sqlx::query_as::<_, StockAdjustment>(&sql)
            .bind(&adjustment_number)
            .bind(input.item_id)
            .bind(input.location_id)
            .bind(input.quantity_change)
            .bind(input.reason.trim())
            .bind(actor)
            .bind(&input.notes)
            .fetch_one(&mut *tx)
            .await?;

        let reference = DocumentRef::new(ReferenceType::Adjustment, adjustment.id);
        let mut consumed = Vec::new();

        let (batch_id, total_cost) = if adjustment.is_gain() {
            let cost = round_cost(input.unit_cost.unwrap_or(item_cost));
            let mut new_batch = NewBatch::received(input.item_id, input.location_id, input.quantity_change, cost);
            new_batch.expiry_date = input.expiry_date;
            new_batch.bin_location = input.bin_location.clone();
            new_batch.notes = Some(format!("Opened by {}", adjustment.adjustment_number));
            new_batch.transaction_type = BatchTransactionType::Adjustment;
            new_batch.reference = Some(reference);

            let batch = BatchService::create_batch(&mut tx, new_batch, actor).await?;
            let value = checked_product(batch.quantity_original, batch.unit_cost, "adjustment value")?;
            (Some(batch.id), value)
        } else {
            let options = FifoOptions {
                now: Utc::now(),
                exclude_expired: self.ledger.exclude_expired,
            };
            consumed = BatchService::consume_fifo(
                &mut tx,
                input.item_id,
                input.location_id,
                input.quantity_change.abs(),
                reference,
                options,
                actor,
            )
            .await?;
            (None, -consumed_cost(&consumed)?)
        };

        let adjustment = sqlx::query_as::<_, StockAdjustment>(&format!(
            "UPDATE stock_adjustments SET total_cost = $2, batch_id = $3 WHERE id = $1 RETURNING {ADJUSTMENT_COLUMNS}"
        ))
        .bind(adjustment.id)
        .bind(total_cost)
        .bind(batch_id)
        .fetch_one(&mut *tx)
        .await?;

        ledger::post_stock(
            &mut tx,
            StockPosting {
                item_id: input.item_id,
                location_id: input.location_id,
                transaction_type: InventoryTransactionType::Adjustment,
                quantity: adjustment.quantity_change,
                reference: Some(reference),
                notes: Some(adjustment.reason.clone()),
            },
            actor,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            adjustment_number = %adjustment.adjustment_number,
            item_id = adjustment.item_id,
            location_id = adjustment.location_id,
            quantity_change = %adjustment.quantity_change,
            value = %adjustment.total_cost,
            "stock adjusted"
        );

        Ok(AdjustmentWithBatches {
            adjustment,
            batches: consumed,
        })
    }

    pub async fn get(&self, adjustment_id: i64) -> AppResult<AdjustmentWithBatches> {
        let adjustment = sqlx::query_as::<_, StockAdjustment>(&format!(
            "SELECT {ADJUSTMENT_COLUMNS} FROM stock_adjustments WHERE id = $1"
        ))
        .bind(adjustment_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Adjustment {}", adjustment_id)))?;

        let batches = if adjustment.is_gain() {
            Vec::new()
        } else {
            let mut conn = self.db.acquire().await?;
            BatchService::consumed_by_reference(
                &mut conn,
                DocumentRef::new(ReferenceType::Adjustment, adjustment.id),
            )
            .await?
        };

        Ok(AdjustmentWithBatches { adjustment, batches })
    }

    pub async fn list(&self, filter: StockFilter) -> AppResult<Vec<StockAdjustment>> {
        let sql = format!(
            r#"
            SELECT {ADJUSTMENT_COLUMNS} FROM stock_adjustments
            WHERE ($1::BIGINT IS NULL OR item_id = $1)
              AND ($2::BIGINT IS NULL OR location_id = $2)
            ORDER BY adjusted_at DESC, id DESC
            "#
        );
        let adjustments = sqlx::query_as::<_, StockAdjustment>(&sql)
            .bind(filter.item_id)
            .bind(filter.location_id)
            .fetch_all(&self.db)
            .await?;
        Ok(adjustments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(quantity_change: &str, reason: &str) -> CreateAdjustmentInput {
        CreateAdjustmentInput {
            item_id: 1,
            location_id: 1,
            quantity_change: quantity_change.parse().unwrap(),
            unit_cost: None,
            reason: reason.to_string(),
            bin_location: None,
            expiry_date: None,
            notes: None,
        }
    }

    #[test]
    fn adjustment_needs_a_reason() {
        assert!(input("-3", "").validate().is_err());
        assert!(input("-3", "Cycle count").validate().is_ok());
    }
}
