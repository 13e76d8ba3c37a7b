//! Stock movements between locations

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use validator::Validate;

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    DocumentRef, InventoryTransactionType, MovementType, ReferenceType, StockFilter, StockMovement,
};
use crate::services::batch::{BatchService, TransferOutcome};
use crate::services::ledger::{self, StockPosting};
use shared::{validate_distinct_locations, validate_positive_quantity, DocumentKind, FifoOptions};

const MOVEMENT_COLUMNS: &str = "id, movement_number, item_id, from_location_id, to_location_id, quantity, \
     movement_type, reason, moved_by, moved_at, notes";

#[derive(Clone)]
pub struct StockMovementService {
    db: PgPool,
    ledger: LedgerConfig,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStockMovementInput {
    pub item_id: i64,
    pub from_location_id: i64,
    pub to_location_id: i64,
    pub quantity: Decimal,
    #[serde(default)]
    pub movement_type: MovementType,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StockMovementWithBatches {
    #[serde(flatten)]
    pub movement: StockMovement,
    pub transfers: Vec<TransferOutcome>,
}

impl StockMovementService {
    pub fn new(db: PgPool, ledger: LedgerConfig) -> Self {
        Self { db, ledger }
    }

    /// Move stock of one item to another location, oldest batches first
    pub async fn create(
        &self,
        input: CreateStockMovementInput,
        actor: Option<i64>,
    ) -> AppResult<StockMovementWithBatches> {
        input.validate()?;
        validate_positive_quantity(input.quantity)
            .map_err(|msg| AppError::validation("quantity", msg))?;
        validate_distinct_locations(input.from_location_id, input.to_location_id)
            .map_err(|msg| AppError::validation("to_location_id", msg))?;

        let mut tx = self.db.begin().await?;

        ledger::ensure_exists(&mut tx, "items", input.item_id, "Item").await?;
        ledger::ensure_exists(&mut tx, "locations", input.from_location_id, "Location").await?;
        ledger::ensure_exists(&mut tx, "locations", input.to_location_id, "Location").await?;

        let movement_number = ledger::next_document_number(&mut tx, DocumentKind::StockMovement).await?;
        let sql = format!(
            r#"
            INSERT INTO stock_movements (movement_number, item_id, from_location_id, to_location_id,
                                         quantity, movement_type, reason, moved_by, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {MOVEMENT_COLUMNS}
            "#
        );
        let movement = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(&movement_number)
            .bind(input.item_id)
            .bind(input.from_location_id)
            .bind(input.to_location_id)
            .bind(input.quantity)
            .bind(input.movement_type)
            .bind(&input.reason)
            .bind(actor)
            .bind(&input.notes)
            .fetch_one(&mut *tx)
            .await?;

        let reference = DocumentRef::new(ReferenceType::StockMovement, movement.id);
        let options = FifoOptions {
            now: Utc::now(),
            exclude_expired: self.ledger.exclude_expired,
        };
        let transfers = BatchService::transfer_fifo(
            &mut tx,
            input.item_id,
            input.from_location_id,
            input.to_location_id,
            input.quantity,
            reference,
            options,
            actor,
        )
        .await?;

        for (location_id, delta, kind) in [
            (input.from_location_id, -input.quantity, InventoryTransactionType::TransferOut),
            (input.to_location_id, input.quantity, InventoryTransactionType::TransferIn),
        ] {
            ledger::post_stock(
                &mut tx,
                StockPosting {
                    item_id: input.item_id,
                    location_id,
                    transaction_type: kind,
                    quantity: delta,
                    reference: Some(reference),
                    notes: input.reason.clone(),
                },
                actor,
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            movement_number = %movement.movement_number,
            item_id = movement.item_id,
            from = movement.from_location_id,
            to = movement.to_location_id,
            quantity = %movement.quantity,
            batches = transfers.len(),
            "stock moved"
        );

        Ok(StockMovementWithBatches { movement, transfers })
    }

    pub async fn get(&self, movement_id: i64) -> AppResult<StockMovement> {
        sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE id = $1"
        ))
        .bind(movement_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Stock movement {}", movement_id)))
    }

    /// Movements touching an item and/or a location (either side)
    pub async fn list(&self, filter: StockFilter) -> AppResult<Vec<StockMovement>> {
        let sql = format!(
            r#"
            SELECT {MOVEMENT_COLUMNS} FROM stock_movements
            WHERE ($1::BIGINT IS NULL OR item_id = $1)
              AND ($2::BIGINT IS NULL OR from_location_id = $2 OR to_location_id = $2)
            ORDER BY moved_at DESC, id DESC
            "#
        );
        let movements = sqlx::query_as::<_, StockMovement>(&sql)
            .bind(filter.item_id)
            .bind(filter.location_id)
            .fetch_all(&self.db)
            .await?;
        Ok(movements)
    }
}
