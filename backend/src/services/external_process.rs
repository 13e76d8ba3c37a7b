//! External processing (material sent out to a subcontractor and received back)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    DocumentRef, ExternalProcess, ExternalProcessStatus, InventoryTransactionType, ReferenceType,
    StatusFlow,
};
use crate::services::batch::{consumed_cost, BatchService, ConsumedBatch};
use crate::services::ledger::{self, StockPosting};
use shared::{validate_positive_quantity, validate_unit_cost, DocumentKind, FifoOptions};

const PROCESS_COLUMNS: &str = "id, process_number, item_id, returned_item_id, location_id, \
     supplier_name, process_type, process_result, quantity_sent, quantity_returned, material_cost, \
     process_cost, status, sent_date, expected_return, actual_return, notes, created_by, created_at";

#[derive(Clone)]
pub struct ExternalProcessService {
    db: PgPool,
    ledger: LedgerConfig,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendExternalProcessInput {
    pub item_id: i64,
    /// Set when the processor returns a different SKU
    pub returned_item_id: Option<i64>,
    pub location_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub supplier_name: String,
    #[validate(length(min = 1, max = 100))]
    pub process_type: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub process_cost: Decimal,
    pub expected_return: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateExternalProcessInput {
    pub status: ExternalProcessStatus,
    pub process_result: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExternalProcessWithBatches {
    #[serde(flatten)]
    pub process: ExternalProcess,
    pub batches: Vec<ConsumedBatch>,
}

impl ExternalProcessService {
    pub fn new(db: PgPool, ledger: LedgerConfig) -> Self {
        Self { db, ledger }
    }

    /// Send material out: it leaves stock by FIFO and its cost is kept on
    /// the process for valuing the return
    pub async fn send(
        &self,
        input: SendExternalProcessInput,
        actor: Option<i64>,
    ) -> AppResult<ExternalProcessWithBatches> {
        input.validate()?;
        validate_positive_quantity(input.quantity)
            .map_err(|msg| AppError::validation("quantity", msg))?;
        validate_unit_cost(input.process_cost)
            .map_err(|msg| AppError::validation("process_cost", msg))?;

        let mut tx = self.db.begin().await?;

        ledger::ensure_exists(&mut tx, "items", input.item_id, "Item").await?;
        if let Some(returned) = input.returned_item_id {
            ledger::ensure_exists(&mut tx, "items", returned, "Item").await?;
        }
        ledger::ensure_exists(&mut tx, "locations", input.location_id, "Location").await?;

        let process_number = ledger::next_document_number(&mut tx, DocumentKind::ExternalProcess).await?;
        let sql = format!(
            r#"
            INSERT INTO external_processes (process_number, item_id, returned_item_id, location_id,
                supplier_name, process_type, quantity_sent, process_cost, status, expected_return,
                notes, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'sent', $9, $10, $11)
            RETURNING {PROCESS_COLUMNS}
            "#
        );
        let process = sqlx::query_as::<_, ExternalProcess>(&sql)
            .bind(&process_number)
            .bind(input.item_id)
            .bind(input.returned_item_id)
            .bind(input.location_id)
            .bind(input.supplier_name.trim())
            .bind(input.process_type.trim())
            .bind(input.quantity)
            .bind(input.process_cost)
            .bind(input.expected_return)
            .bind(&input.notes)
            .bind(actor)
            .fetch_one(&mut *tx)
            .await?;

        let reference = DocumentRef::new(ReferenceType::ExternalProcess, process.id);
        let options = FifoOptions {
            now: Utc::now(),
            exclude_expired: self.ledger.exclude_expired,
        };
        let consumed = BatchService::consume_fifo(
            &mut tx,
            input.item_id,
            input.location_id,
            input.quantity,
            reference,
            options,
            actor,
        )
        .await?;

        let process = sqlx::query_as::<_, ExternalProcess>(&format!(
            "UPDATE external_processes SET material_cost = $2 WHERE id = $1 RETURNING {PROCESS_COLUMNS}"
        ))
        .bind(process.id)
        .bind(consumed_cost(&consumed)?)
        .fetch_one(&mut *tx)
        .await?;

        ledger::post_stock(
            &mut tx,
            StockPosting {
                item_id: input.item_id,
                location_id: input.location_id,
                transaction_type: InventoryTransactionType::ProcessOut,
                quantity: -input.quantity,
                reference: Some(reference),
                notes: Some(format!("Sent to {} for {}", process.supplier_name, process.process_type)),
            },
            actor,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            process_number = %process.process_number,
            supplier = %process.supplier_name,
            quantity = %process.quantity_sent,
            material_cost = %process.material_cost,
            "material sent for external processing"
        );

        Ok(ExternalProcessWithBatches {
            process,
            batches: consumed,
        })
    }

    /// Change status by hand (mark in progress, cancel, close short)
    pub async fn update(&self, process_id: i64, input: UpdateExternalProcessInput) -> AppResult<ExternalProcess> {
        let mut tx = self.db.begin().await?;
        let process = Self::fetch(&mut tx, process_id, true).await?;
        let next = process.status.transition(input.status)?;
        if next == ExternalProcessStatus::Cancelled && process.quantity_returned > Decimal::ZERO {
            return Err(AppError::InvalidStateTransition(format!(
                "external process {} has already received items",
                process.process_number
            )));
        }

        let sql = format!(
            r#"
            UPDATE external_processes
            SET status = $2,
                process_result = COALESCE($3, process_result),
                actual_return = CASE WHEN $2 = 'completed' THEN COALESCE(actual_return, NOW()) ELSE actual_return END
            WHERE id = $1
            RETURNING {PROCESS_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, ExternalProcess>(&sql)
            .bind(process_id)
            .bind(next)
            .bind(&input.process_result)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(process_number = %updated.process_number, status = %updated.status, "external process updated");
        Ok(updated)
    }

    pub(crate) async fn fetch(conn: &mut PgConnection, process_id: i64, lock: bool) -> AppResult<ExternalProcess> {
        let sql = format!(
            "SELECT {PROCESS_COLUMNS} FROM external_processes WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, ExternalProcess>(&sql)
            .bind(process_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("External process {}", process_id)))
    }

    /// Store the returned quantity after a receipt
    pub(crate) async fn record_return(
        conn: &mut PgConnection,
        process_id: i64,
        quantity_returned: Decimal,
        status: ExternalProcessStatus,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE external_processes
            SET quantity_returned = $2, status = $3, actual_return = NOW()
            WHERE id = $1
            "#,
        )
        .bind(process_id)
        .bind(quantity_returned)
        .bind(status)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn get(&self, process_id: i64) -> AppResult<ExternalProcessWithBatches> {
        let mut conn = self.db.acquire().await?;
        let process = Self::fetch(&mut conn, process_id, false).await?;
        let batches = BatchService::consumed_by_reference(
            &mut conn,
            DocumentRef::new(ReferenceType::ExternalProcess, process.id),
        )
        .await?;
        Ok(ExternalProcessWithBatches { process, batches })
    }

    pub async fn list(&self, status: Option<ExternalProcessStatus>) -> AppResult<Vec<ExternalProcess>> {
        let sql = format!(
            r#"
            SELECT {PROCESS_COLUMNS} FROM external_processes
            WHERE ($1::VARCHAR IS NULL OR status = $1)
            ORDER BY sent_date DESC, id DESC
            "#
        );
        let processes = sqlx::query_as::<_, ExternalProcess>(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.db)
            .await?;
        Ok(processes)
    }
}
