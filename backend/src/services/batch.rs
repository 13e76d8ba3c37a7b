//! Batch ledger service
//!
//! Creates batches, consumes them oldest-first and moves them between
//! locations. The in-transaction operations are associated functions taking
//! the caller's connection; document services compose them inside their own
//! transaction. Inventory levels are not touched here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    Batch, BatchStatus, BatchTransaction, BatchTransactionType, DocumentRef,
    InventoryTransactionType, OwnershipType,
};
use crate::services::ledger::{self, StockPosting};
use shared::{
    apply_allocations, checked_product, checked_total, fifo_cost, select_fifo, split_batch_number,
    validate_positive_quantity, Allocation, DocumentKind, FifoCost, FifoOptions, LedgerError,
};

pub(crate) const BATCH_COLUMNS: &str = r#"
    id, batch_number, item_id, location_id, receipt_id, po_id, production_order_number,
    external_process_id, supplier_batch_number, bin_location, quantity_original,
    quantity_available, received_at, expiry_date, unit_cost, ownership_type, status,
    notes, created_by, created_at, updated_at
"#;

/// Batch service
#[derive(Clone)]
pub struct BatchService {
    db: PgPool,
    ledger: LedgerConfig,
}

/// Input for a new batch
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub item_id: i64,
    pub location_id: i64,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    /// Defaults to now
    pub received_at: Option<DateTime<Utc>>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub ownership_type: OwnershipType,
    pub receipt_id: Option<i64>,
    pub po_id: Option<i64>,
    pub production_order_number: Option<String>,
    pub external_process_id: Option<i64>,
    pub supplier_batch_number: Option<String>,
    pub bin_location: Option<String>,
    pub notes: Option<String>,
    /// `Receipt`, `Production` or `Adjustment`
    pub transaction_type: BatchTransactionType,
    pub reference: Option<DocumentRef>,
}

impl NewBatch {
    pub fn received(item_id: i64, location_id: i64, quantity: Decimal, unit_cost: Decimal) -> Self {
        Self {
            item_id,
            location_id,
            quantity,
            unit_cost,
            received_at: None,
            expiry_date: None,
            ownership_type: OwnershipType::Owned,
            receipt_id: None,
            po_id: None,
            production_order_number: None,
            external_process_id: None,
            supplier_batch_number: None,
            bin_location: None,
            notes: None,
            transaction_type: BatchTransactionType::Receipt,
            reference: None,
        }
    }
}

/// One batch drawn down by a FIFO consumption
#[derive(Debug, Clone, Serialize)]
pub struct ConsumedBatch {
    pub batch_id: i64,
    pub batch_number: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
}

impl TryFrom<&Allocation> for ConsumedBatch {
    type Error = LedgerError;

    fn try_from(a: &Allocation) -> Result<Self, Self::Error> {
        Ok(Self {
            batch_id: a.batch_id,
            batch_number: a.batch_number.clone(),
            quantity: a.quantity,
            unit_cost: a.unit_cost,
            total_cost: a.cost()?,
        })
    }
}

/// Total cost of a consumption
pub fn consumed_cost(consumed: &[ConsumedBatch]) -> AppResult<Decimal> {
    Ok(checked_total(consumed.iter().map(|c| c.total_cost), "consumed cost")?)
}

#[derive(Debug, Clone)]
struct NewBatchTransaction {
    batch_id: i64,
    transaction_type: BatchTransactionType,
    quantity: Decimal,
    reference: Option<DocumentRef>,
    from_location_id: Option<i64>,
    to_location_id: Option<i64>,
    notes: Option<String>,
}

/// Result of a batch transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    /// Batch now holding the moved quantity at the destination
    pub batch: Batch,
    /// Batch left behind at the source, `None` when the whole batch moved
    pub remainder: Option<Batch>,
}

/// Query filter for batch lists
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchFilter {
    pub item_id: Option<i64>,
    pub location_id: Option<i64>,
    pub status: Option<BatchStatus>,
    pub ownership_type: Option<OwnershipType>,
}

/// Input for the batch transfer endpoint
#[derive(Debug, Deserialize)]
pub struct TransferBatchInput {
    pub to_location_id: i64,
    /// Bin at the destination; a whole-batch move keeps its bin when omitted
    pub to_bin_location: Option<String>,
    /// Whole batch when omitted
    pub quantity: Option<Decimal>,
    pub notes: Option<String>,
}

/// Batch row with a readable origin
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummaryRow {
    #[serde(flatten)]
    pub batch: Batch,
    pub source: String,
    pub remaining_value: Decimal,
}

/// Batches of an item, optionally at one location
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub item_id: i64,
    pub location_id: Option<i64>,
    pub batch_count: usize,
    pub total_quantity: Decimal,
    pub total_value: Decimal,
    pub oldest_received: Option<DateTime<Utc>>,
    pub newest_received: Option<DateTime<Utc>>,
    pub batches: Vec<BatchSummaryRow>,
}

/// Consumable batches of an item at a location, in FIFO order
#[derive(Debug, Clone, Serialize)]
pub struct FifoAvailability {
    pub item_id: i64,
    pub location_id: i64,
    pub total_available: Decimal,
    pub batches: Vec<Batch>,
}

/// What a consumption would draw, without drawing it
#[derive(Debug, Clone, Serialize)]
pub struct FifoPreview {
    pub allocations: Vec<Allocation>,
    pub cost: FifoCost,
}

#[derive(Debug, Deserialize)]
pub struct FifoPreviewQuery {
    pub item_id: i64,
    pub location_id: i64,
    pub quantity: Decimal,
}

#[derive(Debug, FromRow)]
struct CountRow {
    count: i64,
}

impl BatchService {
    pub fn new(db: PgPool, ledger: LedgerConfig) -> Self {
        Self { db, ledger }
    }

    fn fifo_options(&self) -> FifoOptions {
        FifoOptions {
            now: Utc::now(),
            exclude_expired: self.ledger.exclude_expired,
        }
    }

    // ========================================================================
    // In-transaction operations
    // ========================================================================

    /// Insert a batch with the next batch number and its opening transaction
    pub async fn create_batch(
        conn: &mut PgConnection,
        input: NewBatch,
        actor: Option<i64>,
    ) -> AppResult<Batch> {
        validate_positive_quantity(input.quantity)
            .map_err(|msg| AppError::validation("quantity", msg))?;
        if input.unit_cost < Decimal::ZERO {
            return Err(AppError::validation("unit_cost", "Cost cannot be negative"));
        }

        let batch_number = ledger::next_document_number(conn, DocumentKind::Batch).await?;
        let batch = Self::insert_batch(conn, &input, &batch_number, actor).await?;

        Self::record_transaction(
            conn,
            NewBatchTransaction {
                batch_id: batch.id,
                transaction_type: input.transaction_type,
                quantity: batch.quantity_original,
                reference: input.reference,
                from_location_id: None,
                to_location_id: Some(batch.location_id),
                notes: input.notes.clone(),
            },
            actor,
        )
        .await?;

        tracing::info!(
            batch_number = %batch.batch_number,
            item_id = batch.item_id,
            location_id = batch.location_id,
            quantity = %batch.quantity_original,
            unit_cost = %batch.unit_cost,
            "batch created"
        );

        Ok(batch)
    }

    async fn insert_batch(
        conn: &mut PgConnection,
        input: &NewBatch,
        batch_number: &str,
        actor: Option<i64>,
    ) -> AppResult<Batch> {
        let sql = format!(
            r#"
            INSERT INTO batches (
                batch_number, item_id, location_id, receipt_id, po_id, production_order_number,
                external_process_id, supplier_batch_number, bin_location, quantity_original,
                quantity_available, received_at, expiry_date, unit_cost, ownership_type, status,
                notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10, COALESCE($11, NOW()), $12, $13, $14, 'active', $15, $16)
            RETURNING {BATCH_COLUMNS}
            "#
        );

        let batch = sqlx::query_as::<_, Batch>(&sql)
            .bind(batch_number)
            .bind(input.item_id)
            .bind(input.location_id)
            .bind(input.receipt_id)
            .bind(input.po_id)
            .bind(&input.production_order_number)
            .bind(input.external_process_id)
            .bind(&input.supplier_batch_number)
            .bind(&input.bin_location)
            .bind(input.quantity)
            .bind(input.received_at)
            .bind(input.expiry_date)
            .bind(input.unit_cost)
            .bind(input.ownership_type)
            .bind(&input.notes)
            .bind(actor)
            .fetch_one(&mut *conn)
            .await
            .map_err(AppError::unique_violation("batch_number"))?;

        Ok(batch)
    }

    async fn record_transaction(
        conn: &mut PgConnection,
        txn: NewBatchTransaction,
        actor: Option<i64>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO batch_transactions (
                batch_id, transaction_type, quantity, reference_type, reference_id,
                from_location_id, to_location_id, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(txn.batch_id)
        .bind(txn.transaction_type)
        .bind(txn.quantity)
        .bind(txn.reference.map(|r| r.reference_type.as_str()))
        .bind(txn.reference.map(|r| r.reference_id))
        .bind(txn.from_location_id)
        .bind(txn.to_location_id)
        .bind(&txn.notes)
        .bind(actor)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Drawable batches of an item at a location, locked, in FIFO order.
    /// Swept `expired` batches are included when expiry is not enforced.
    async fn lock_candidates(
        conn: &mut PgConnection,
        item_id: i64,
        location_id: i64,
        options: FifoOptions,
    ) -> AppResult<Vec<Batch>> {
        let sql = format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM batches
            WHERE item_id = $1 AND location_id = $2
              AND (status = 'active' OR (NOT $3 AND status = 'expired'))
              AND quantity_available > 0
            ORDER BY received_at ASC, id ASC
            FOR UPDATE
            "#
        );

        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(item_id)
            .bind(location_id)
            .bind(options.exclude_expired)
            .fetch_all(&mut *conn)
            .await?;

        Ok(batches)
    }

    /// Draw `quantity` of an item at a location, oldest batches first.
    ///
    /// Either the whole quantity is drawn or nothing is: a shortage fails
    /// before any batch is written.
    pub async fn consume_fifo(
        conn: &mut PgConnection,
        item_id: i64,
        location_id: i64,
        quantity: Decimal,
        reference: DocumentRef,
        options: FifoOptions,
        actor: Option<i64>,
    ) -> AppResult<Vec<ConsumedBatch>> {
        let mut batches = Self::lock_candidates(conn, item_id, location_id, options).await?;

        let plan = select_fifo(&batches, quantity, options)
            .map_err(|e| AppError::stock_shortage(e, item_id, location_id))?;
        apply_allocations(&mut batches, &plan)?;

        for allocation in &plan {
            let Some(batch) = batches.iter().find(|b| b.id == allocation.batch_id) else {
                continue;
            };

            sqlx::query(
                r#"
                UPDATE batches
                SET quantity_available = $2, status = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(batch.id)
            .bind(batch.quantity_available)
            .bind(batch.status)
            .execute(&mut *conn)
            .await?;

            Self::record_transaction(
                conn,
                NewBatchTransaction {
                    batch_id: batch.id,
                    transaction_type: BatchTransactionType::Consumption,
                    quantity: -allocation.quantity,
                    reference: Some(reference),
                    from_location_id: Some(location_id),
                    to_location_id: None,
                    notes: None,
                },
                actor,
            )
            .await?;
        }

        let consumed = plan
            .iter()
            .map(ConsumedBatch::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            item_id,
            location_id,
            quantity = %quantity,
            batches = consumed.len(),
            cost = %consumed_cost(&consumed)?,
            reference = %reference.reference_type,
            reference_id = reference.reference_id,
            "fifo consumption"
        );

        Ok(consumed)
    }

    /// Batches drawn down by a document, in draw order
    pub async fn consumed_by_reference(
        conn: &mut PgConnection,
        reference: DocumentRef,
    ) -> AppResult<Vec<ConsumedBatch>> {
        let rows = sqlx::query_as::<_, (i64, String, Decimal, Decimal)>(
            r#"
            SELECT b.id, b.batch_number, -bt.quantity, b.unit_cost
            FROM batch_transactions bt
            JOIN batches b ON b.id = bt.batch_id
            WHERE bt.reference_type = $1 AND bt.reference_id = $2
              AND bt.transaction_type = 'consumption'
            ORDER BY bt.id
            "#,
        )
        .bind(reference.reference_type.as_str())
        .bind(reference.reference_id)
        .fetch_all(&mut *conn)
        .await?;

        let consumed = rows
            .into_iter()
            .map(|(batch_id, batch_number, quantity, unit_cost)| {
                Ok(ConsumedBatch {
                    batch_id,
                    batch_number,
                    quantity,
                    unit_cost,
                    total_cost: checked_product(quantity, unit_cost, "consumed cost")?,
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;
        Ok(consumed)
    }

    /// Move `quantity` of a batch to another location.
    ///
    /// Moving the full remainder relocates the batch itself. A partial move
    /// draws the source down and creates a split batch at the destination
    /// that keeps the source's received date, cost, expiry, ownership and
    /// origin links, so FIFO age survives the move. `to_bin_location` sets
    /// the bin at the destination; a relocated batch keeps its bin without it.
    pub async fn transfer_batch(
        conn: &mut PgConnection,
        batch_id: i64,
        to_location_id: i64,
        to_bin_location: Option<String>,
        quantity: Decimal,
        reference: Option<DocumentRef>,
        actor: Option<i64>,
    ) -> AppResult<TransferOutcome> {
        let sql = format!("SELECT {BATCH_COLUMNS} FROM batches WHERE id = $1 FOR UPDATE");
        let mut source = sqlx::query_as::<_, Batch>(&sql)
            .bind(batch_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", batch_id)))?;

        if !matches!(source.status, BatchStatus::Active | BatchStatus::Expired) {
            return Err(AppError::InvalidStateTransition(format!(
                "batch {} is {} and cannot be moved",
                source.batch_number, source.status
            )));
        }
        shared::validate_distinct_locations(source.location_id, to_location_id)
            .map_err(|msg| AppError::validation("to_location_id", msg))?;

        let from_location_id = source.location_id;

        if quantity == source.quantity_available {
            let moved = sqlx::query_as::<_, Batch>(&format!(
                "UPDATE batches SET location_id = $2, bin_location = COALESCE($3, bin_location), updated_at = NOW() WHERE id = $1 RETURNING {BATCH_COLUMNS}"
            ))
            .bind(source.id)
            .bind(to_location_id)
            .bind(&to_bin_location)
            .fetch_one(&mut *conn)
            .await?;

            Self::record_transaction(
                conn,
                NewBatchTransaction {
                    batch_id: moved.id,
                    transaction_type: BatchTransactionType::Transfer,
                    quantity,
                    reference,
                    from_location_id: Some(from_location_id),
                    to_location_id: Some(to_location_id),
                    notes: None,
                },
                actor,
            )
            .await?;

            return Ok(TransferOutcome {
                batch: moved,
                remainder: None,
            });
        }

        source.consume(quantity)?;

        sqlx::query(
            "UPDATE batches SET quantity_available = $2, status = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(source.id)
        .bind(source.quantity_available)
        .bind(source.status)
        .execute(&mut *conn)
        .await?;

        Self::record_transaction(
            conn,
            NewBatchTransaction {
                batch_id: source.id,
                transaction_type: BatchTransactionType::TransferOut,
                quantity: -quantity,
                reference,
                from_location_id: Some(from_location_id),
                to_location_id: Some(to_location_id),
                notes: None,
            },
            actor,
        )
        .await?;

        let existing = sqlx::query_as::<_, CountRow>(
            "SELECT COUNT(*) AS count FROM batches WHERE batch_number ~ ('^' || $1 || '-S[0-9]+$')",
        )
        .bind(&source.batch_number)
        .fetch_one(&mut *conn)
        .await?;
        let split_number = split_batch_number(&source.batch_number, existing.count as u32 + 1);

        let split_input = NewBatch {
            item_id: source.item_id,
            location_id: to_location_id,
            quantity,
            unit_cost: source.unit_cost,
            received_at: Some(source.received_at),
            expiry_date: source.expiry_date,
            ownership_type: source.ownership_type,
            receipt_id: source.receipt_id,
            po_id: source.po_id,
            production_order_number: source.production_order_number.clone(),
            external_process_id: source.external_process_id,
            supplier_batch_number: source.supplier_batch_number.clone(),
            bin_location: to_bin_location,
            notes: Some(format!("Split from {}", source.batch_number)),
            transaction_type: BatchTransactionType::TransferIn,
            reference,
        };
        let split = Self::insert_batch(conn, &split_input, &split_number, actor).await?;

        Self::record_transaction(
            conn,
            NewBatchTransaction {
                batch_id: split.id,
                transaction_type: BatchTransactionType::TransferIn,
                quantity,
                reference,
                from_location_id: Some(from_location_id),
                to_location_id: Some(to_location_id),
                notes: split_input.notes.clone(),
            },
            actor,
        )
        .await?;

        tracing::info!(
            source = %source.batch_number,
            split = %split.batch_number,
            quantity = %quantity,
            "batch split on transfer"
        );

        Ok(TransferOutcome {
            batch: split,
            remainder: Some(source),
        })
    }

    /// Move a quantity of an item between locations batch by batch, oldest
    /// first, and post the stock on both sides
    pub async fn transfer_fifo(
        conn: &mut PgConnection,
        item_id: i64,
        from_location_id: i64,
        to_location_id: i64,
        quantity: Decimal,
        reference: DocumentRef,
        options: FifoOptions,
        actor: Option<i64>,
    ) -> AppResult<Vec<TransferOutcome>> {
        let batches = Self::lock_candidates(conn, item_id, from_location_id, options).await?;
        let plan = select_fifo(&batches, quantity, options)
            .map_err(|e| AppError::stock_shortage(e, item_id, from_location_id))?;

        let mut outcomes = Vec::with_capacity(plan.len());
        for allocation in &plan {
            let outcome = Self::transfer_batch(
                conn,
                allocation.batch_id,
                to_location_id,
                None,
                allocation.quantity,
                Some(reference),
                actor,
            )
            .await?;
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    // ========================================================================
    // Endpoint operations
    // ========================================================================

    /// Transfer one batch and post the stock move on both locations
    pub async fn transfer(
        &self,
        batch_id: i64,
        input: TransferBatchInput,
        actor: Option<i64>,
    ) -> AppResult<TransferOutcome> {
        let mut tx = self.db.begin().await?;

        ledger::ensure_exists(&mut tx, "locations", input.to_location_id, "Location").await?;

        let current = sqlx::query_as::<_, (Decimal, i64, i64)>(
            "SELECT quantity_available, item_id, location_id FROM batches WHERE id = $1",
        )
        .bind(batch_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Batch {}", batch_id)))?;

        let quantity = input.quantity.unwrap_or(current.0);
        validate_positive_quantity(quantity).map_err(|msg| AppError::validation("quantity", msg))?;

        let outcome = Self::transfer_batch(
            &mut tx,
            batch_id,
            input.to_location_id,
            input.to_bin_location.clone(),
            quantity,
            None,
            actor,
        )
        .await?;

        for (location_id, delta, kind) in [
            (current.2, -quantity, InventoryTransactionType::TransferOut),
            (input.to_location_id, quantity, InventoryTransactionType::TransferIn),
        ] {
            ledger::post_stock(
                &mut tx,
                StockPosting {
                    item_id: current.1,
                    location_id,
                    transaction_type: kind,
                    quantity: delta,
                    reference: None,
                    notes: input.notes.clone(),
                },
                actor,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn list_batches(&self, filter: BatchFilter) -> AppResult<Vec<Batch>> {
        let sql = format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM batches
            WHERE ($1::BIGINT IS NULL OR item_id = $1)
              AND ($2::BIGINT IS NULL OR location_id = $2)
              AND ($3::VARCHAR IS NULL OR status = $3)
              AND ($4::VARCHAR IS NULL OR ownership_type = $4)
            ORDER BY received_at DESC, id DESC
            "#
        );

        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(filter.item_id)
            .bind(filter.location_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.ownership_type.map(|o| o.as_str()))
            .fetch_all(&self.db)
            .await?;

        Ok(batches)
    }

    pub async fn get_batch(&self, batch_id: i64) -> AppResult<Batch> {
        let sql = format!("SELECT {BATCH_COLUMNS} FROM batches WHERE id = $1");
        sqlx::query_as::<_, Batch>(&sql)
            .bind(batch_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", batch_id)))
    }

    pub async fn batch_transactions(&self, batch_id: i64) -> AppResult<Vec<BatchTransaction>> {
        self.get_batch(batch_id).await?;

        let rows = sqlx::query_as::<_, BatchTransaction>(
            r#"
            SELECT id, batch_id, transaction_type, quantity, reference_type, reference_id,
                   from_location_id, to_location_id, notes, created_by, created_at
            FROM batch_transactions
            WHERE batch_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Non-depleted batches of an item with totals
    pub async fn batch_summary(&self, item_id: i64, location_id: Option<i64>) -> AppResult<BatchSummary> {
        let sql = format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM batches
            WHERE item_id = $1
              AND ($2::BIGINT IS NULL OR location_id = $2)
              AND status <> 'depleted'
            ORDER BY received_at ASC, id ASC
            "#
        );
        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(item_id)
            .bind(location_id)
            .fetch_all(&self.db)
            .await?;

        let total_quantity =
            checked_total(batches.iter().map(|b| b.quantity_available), "batch quantity")?;
        let oldest_received = batches.iter().map(|b| b.received_at).min();
        let newest_received = batches.iter().map(|b| b.received_at).max();

        let rows = batches
            .into_iter()
            .map(|batch| {
                Ok(BatchSummaryRow {
                    source: batch.source_description(),
                    remaining_value: batch.remaining_value()?,
                    batch,
                })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;
        let total_value = checked_total(rows.iter().map(|r| r.remaining_value), "batch value")?;

        Ok(BatchSummary {
            item_id,
            location_id,
            batch_count: rows.len(),
            total_quantity,
            total_value,
            oldest_received,
            newest_received,
            batches: rows,
        })
    }

    /// Batches FIFO consumption would draw from, in draw order
    pub async fn available_fifo(&self, item_id: i64, location_id: i64) -> AppResult<FifoAvailability> {
        let sql = format!(
            r#"
            SELECT {BATCH_COLUMNS}
            FROM batches
            WHERE item_id = $1 AND location_id = $2
              AND (status = 'active' OR (NOT $3 AND status = 'expired'))
              AND quantity_available > 0
            ORDER BY received_at ASC, id ASC
            "#
        );
        let options = self.fifo_options();
        let batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(item_id)
            .bind(location_id)
            .bind(options.exclude_expired)
            .fetch_all(&self.db)
            .await?;

        let batches: Vec<Batch> = shared::fifo_candidates(&batches, options)
            .into_iter()
            .cloned()
            .collect();
        let total_available =
            checked_total(batches.iter().map(|b| b.quantity_available), "available quantity")?;

        Ok(FifoAvailability {
            item_id,
            location_id,
            total_available,
            batches,
        })
    }

    /// Allocation plan and cost for a quantity, nothing is written
    pub async fn preview_fifo(&self, query: FifoPreviewQuery) -> AppResult<FifoPreview> {
        let available = self.available_fifo(query.item_id, query.location_id).await?;
        let allocations = select_fifo(&available.batches, query.quantity, self.fifo_options())
            .map_err(|e| AppError::stock_shortage(e, query.item_id, query.location_id))?;
        let cost = fifo_cost(&allocations)?;

        Ok(FifoPreview { allocations, cost })
    }

    /// Mark active batches past their expiry date as expired
    pub async fn expire_batches(&self, now: DateTime<Utc>) -> AppResult<Vec<Batch>> {
        let mut tx = self.db.begin().await?;

        let sql = format!(
            r#"
            UPDATE batches
            SET status = 'expired', updated_at = NOW()
            WHERE status = 'active' AND expiry_date IS NOT NULL AND expiry_date <= $1
            RETURNING {BATCH_COLUMNS}
            "#
        );
        let expired = sqlx::query_as::<_, Batch>(&sql)
            .bind(now)
            .fetch_all(&mut *tx)
            .await?;

        for batch in &expired {
            Self::record_transaction(
                &mut tx,
                NewBatchTransaction {
                    batch_id: batch.id,
                    transaction_type: BatchTransactionType::Adjustment,
                    quantity: Decimal::ZERO,
                    reference: None,
                    from_location_id: None,
                    to_location_id: None,
                    notes: Some("Expired".to_string()),
                },
                None,
            )
            .await?;
        }

        tx.commit().await?;

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "batches expired");
        }
        Ok(expired)
    }

    /// Put an active batch on hold or release it
    pub async fn set_quarantine(
        &self,
        batch_id: i64,
        quarantine: bool,
        actor: Option<i64>,
    ) -> AppResult<Batch> {
        let mut tx = self.db.begin().await?;

        let (from, to) = if quarantine {
            (BatchStatus::Active, BatchStatus::Quarantine)
        } else {
            (BatchStatus::Quarantine, BatchStatus::Active)
        };

        let sql = format!(
            "UPDATE batches SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2 RETURNING {BATCH_COLUMNS}"
        );
        let batch = sqlx::query_as::<_, Batch>(&sql)
            .bind(batch_id)
            .bind(from)
            .bind(to)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(batch) = batch else {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM batches WHERE id = $1)")
                .bind(batch_id)
                .fetch_one(&mut *tx)
                .await?;
            return Err(if exists {
                AppError::InvalidStateTransition(format!("batch {} is not {}", batch_id, from))
            } else {
                AppError::NotFound(format!("Batch {}", batch_id))
            });
        };

        Self::record_transaction(
            &mut tx,
            NewBatchTransaction {
                batch_id: batch.id,
                transaction_type: BatchTransactionType::Adjustment,
                quantity: Decimal::ZERO,
                reference: None,
                from_location_id: None,
                to_location_id: None,
                notes: Some(format!("Status {} -> {}", from, to)),
            },
            actor,
        )
        .await?;

        tx.commit().await?;
        Ok(batch)
    }
}
