//! Goods receipts
//!
//! A receipt line's good quantity becomes a new batch at the receiving
//! location. Its scrap quantity is recorded as scrap and never enters stock.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{
    BatchTransactionType, DocumentRef, ExternalProcess, ExternalProcessStatus,
    InventoryTransactionType, OwnershipType, Receipt, ReceiptLine, ReceiptSource, ReferenceType,
    ScrapSource, StatusFlow,
};
use crate::services::batch::{BatchService, NewBatch};
use crate::services::external_process::ExternalProcessService;
use crate::services::ledger::{self, StockPosting};
use crate::services::purchase_order::PurchaseOrderService;
use crate::services::scrap::{ScrapService, UnstockedScrap};
use shared::{checked_total, round_cost, unit_cost, validate_receipt_line, DocumentKind, LedgerResult};

const RECEIPT_COLUMNS: &str = "id, receipt_number, source_type, po_id, external_process_id, \
     production_order_number, location_id, received_at, received_by, notes, created_at";

const LINE_COLUMNS: &str = "id, receipt_id, item_id, quantity, scrap_quantity, batch_id, notes";

#[derive(Clone)]
pub struct ReceiptService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReceiptInput {
    pub source_type: ReceiptSource,
    pub po_id: Option<i64>,
    pub external_process_id: Option<i64>,
    pub location_id: i64,
    pub received_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<ReceiptLineInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptLineInput {
    pub item_id: i64,
    pub quantity: Decimal,
    #[serde(default)]
    pub scrap_quantity: Decimal,
    /// Overrides the purchase price or item cost
    pub unit_cost: Option<Decimal>,
    #[serde(default)]
    pub ownership_type: OwnershipType,
    pub expiry_date: Option<DateTime<Utc>>,
    pub supplier_batch_number: Option<String>,
    pub bin_location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReceiptWithLines {
    #[serde(flatten)]
    pub receipt: Receipt,
    pub lines: Vec<ReceiptLine>,
}

/// Header fields of a receipt written by another document
#[derive(Debug, Clone)]
pub(crate) struct ReceiptHeader {
    pub source_type: ReceiptSource,
    pub po_id: Option<i64>,
    pub external_process_id: Option<i64>,
    pub production_order_number: Option<String>,
    pub location_id: i64,
    pub received_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Unit cost of returned material: what was sent plus the processor's fee,
/// spread over the quantity sent
pub fn external_return_unit_cost(process: &ExternalProcess) -> LedgerResult<Decimal> {
    let total = checked_total([process.material_cost, process.process_cost], "external process cost")?;
    unit_cost(total, process.quantity_sent)
}

impl ReceiptService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: CreateReceiptInput, actor: Option<i64>) -> AppResult<ReceiptWithLines> {
        input.validate()?;
        for line in &input.lines {
            validate_receipt_line(line.quantity, line.scrap_quantity)
                .map_err(|msg| AppError::validation("lines.quantity", msg))?;
            if matches!(line.unit_cost, Some(c) if c < Decimal::ZERO) {
                return Err(AppError::validation("lines.unit_cost", "Cost cannot be negative"));
            }
        }

        let mut tx = self.db.begin().await?;

        ledger::ensure_exists(&mut tx, "locations", input.location_id, "Location").await?;

        let mut process = None;
        match input.source_type {
            ReceiptSource::PurchaseOrder => {
                let po_id = input
                    .po_id
                    .ok_or_else(|| AppError::validation("po_id", "Purchase order receipts need a po_id"))?;
                let order = PurchaseOrderService::fetch(&mut tx, po_id, true).await?;
                if !order.status.accepts_receipts() {
                    return Err(AppError::InvalidStateTransition(format!(
                        "purchase order {} is {} and cannot be received",
                        order.po_number, order.status
                    )));
                }
            }
            ReceiptSource::ExternalProcess => {
                let process_id = input.external_process_id.ok_or_else(|| {
                    AppError::validation("external_process_id", "External process receipts need a process id")
                })?;
                let found = ExternalProcessService::fetch(&mut tx, process_id, true).await?;
                if !found.status.accepts_returns() {
                    return Err(AppError::InvalidStateTransition(format!(
                        "external process {} is {}",
                        found.process_number, found.status
                    )));
                }
                if let Some(line) = input.lines.iter().find(|l| !found.accepts_item(l.item_id)) {
                    return Err(AppError::validation(
                        "lines.item_id",
                        format!(
                            "Item {} was not sent on {}, expected item {} back",
                            line.item_id,
                            found.process_number,
                            found.return_item_id()
                        ),
                    ));
                }
                process = Some(found);
            }
            ReceiptSource::Manual => {}
            ReceiptSource::Production => {
                return Err(AppError::validation(
                    "source_type",
                    "Production receipts are created by completing a production order",
                ));
            }
        }

        let receipt = Self::insert_header(
            &mut tx,
            ReceiptHeader {
                source_type: input.source_type,
                po_id: input.po_id.filter(|_| input.source_type == ReceiptSource::PurchaseOrder),
                external_process_id: process.as_ref().map(|p| p.id),
                production_order_number: None,
                location_id: input.location_id,
                received_at: input.received_at,
                notes: input.notes.clone(),
            },
            actor,
        )
        .await?;
        let reference = DocumentRef::new(ReferenceType::Receipt, receipt.id);

        let mut lines = Vec::with_capacity(input.lines.len());
        let mut returned = Decimal::ZERO;

        for line in &input.lines {
            let item_cost: Decimal = sqlx::query_scalar("SELECT unit_cost FROM items WHERE id = $1")
                .bind(line.item_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Item {}", line.item_id)))?;

            let po_price = match receipt.po_id {
                Some(po_id) => Some(
                    PurchaseOrderService::receive_line(&mut tx, po_id, line.item_id, line.quantity).await?,
                ),
                None => None,
            };
            let process_cost = process.as_ref().map(external_return_unit_cost).transpose()?;
            let cost = line
                .unit_cost
                .or(po_price)
                .or(process_cost)
                .unwrap_or(item_cost);

            let good = line.quantity - line.scrap_quantity;
            let mut batch_id = None;

            if good > Decimal::ZERO {
                let mut new_batch = NewBatch::received(line.item_id, receipt.location_id, good, round_cost(cost));
                new_batch.received_at = Some(receipt.received_at);
                new_batch.expiry_date = line.expiry_date;
                new_batch.ownership_type = line.ownership_type;
                new_batch.receipt_id = Some(receipt.id);
                new_batch.po_id = receipt.po_id;
                new_batch.external_process_id = receipt.external_process_id;
                new_batch.supplier_batch_number = line.supplier_batch_number.clone();
                new_batch.bin_location = line.bin_location.clone();
                new_batch.notes = line.notes.clone();
                new_batch.transaction_type = BatchTransactionType::Receipt;
                new_batch.reference = Some(reference);

                let batch = BatchService::create_batch(&mut tx, new_batch, actor).await?;
                batch_id = Some(batch.id);

                ledger::post_stock(
                    &mut tx,
                    StockPosting {
                        item_id: line.item_id,
                        location_id: receipt.location_id,
                        transaction_type: InventoryTransactionType::Receipt,
                        quantity: good,
                        reference: Some(reference),
                        notes: Some(format!("Good quantity from {}", receipt.source_type)),
                    },
                    actor,
                )
                .await?;
            }

            if line.scrap_quantity > Decimal::ZERO {
                ScrapService::record_unstocked(
                    &mut tx,
                    UnstockedScrap {
                        item_id: line.item_id,
                        location_id: receipt.location_id,
                        quantity: line.scrap_quantity,
                        total_cost: Decimal::ZERO,
                        reason: "Damaged during reception".to_string(),
                        source_type: ScrapSource::Receipt,
                        source_id: Some(receipt.id),
                        notes: Some(format!("Scrapped from {}", receipt.receipt_number)),
                    },
                    actor,
                )
                .await?;
            }

            returned = checked_total([returned, line.quantity], "returned quantity")?;
            lines.push(
                Self::insert_line(&mut tx, receipt.id, line.item_id, line.quantity, line.scrap_quantity, batch_id, line.notes.clone())
                    .await?,
            );
        }

        if let Some(po_id) = receipt.po_id {
            PurchaseOrderService::refresh_status(&mut tx, po_id).await?;
        }
        if let Some(process) = &process {
            let total_returned = checked_total([process.quantity_returned, returned], "returned quantity")?;
            let next = process
                .status
                .transition(ExternalProcessStatus::after_return(process.quantity_sent, total_returned))?;
            ExternalProcessService::record_return(&mut tx, process.id, total_returned, next).await?;
        }

        tx.commit().await?;

        tracing::info!(
            receipt_number = %receipt.receipt_number,
            source = %receipt.source_type,
            lines = lines.len(),
            "receipt posted"
        );

        Ok(ReceiptWithLines { receipt, lines })
    }

    pub(crate) async fn insert_header(
        conn: &mut PgConnection,
        header: ReceiptHeader,
        actor: Option<i64>,
    ) -> AppResult<Receipt> {
        let receipt_number = ledger::next_document_number(conn, DocumentKind::Receipt).await?;
        let sql = format!(
            r#"
            INSERT INTO receipts (receipt_number, source_type, po_id, external_process_id,
                                  production_order_number, location_id, received_at, received_by, notes)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, NOW()), $8, $9)
            RETURNING {RECEIPT_COLUMNS}
            "#
        );
        let receipt = sqlx::query_as::<_, Receipt>(&sql)
            .bind(&receipt_number)
            .bind(header.source_type)
            .bind(header.po_id)
            .bind(header.external_process_id)
            .bind(&header.production_order_number)
            .bind(header.location_id)
            .bind(header.received_at)
            .bind(actor)
            .bind(&header.notes)
            .fetch_one(&mut *conn)
            .await?;
        Ok(receipt)
    }

    pub(crate) async fn insert_line(
        conn: &mut PgConnection,
        receipt_id: i64,
        item_id: i64,
        quantity: Decimal,
        scrap_quantity: Decimal,
        batch_id: Option<i64>,
        notes: Option<String>,
    ) -> AppResult<ReceiptLine> {
        let sql = format!(
            r#"
            INSERT INTO receipt_lines (receipt_id, item_id, quantity, scrap_quantity, batch_id, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {LINE_COLUMNS}
            "#
        );
        let line = sqlx::query_as::<_, ReceiptLine>(&sql)
            .bind(receipt_id)
            .bind(item_id)
            .bind(quantity)
            .bind(scrap_quantity)
            .bind(batch_id)
            .bind(notes)
            .fetch_one(&mut *conn)
            .await?;
        Ok(line)
    }

    pub async fn get(&self, receipt_id: i64) -> AppResult<ReceiptWithLines> {
        let receipt = sqlx::query_as::<_, Receipt>(&format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts WHERE id = $1"
        ))
        .bind(receipt_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Receipt {}", receipt_id)))?;

        let lines = sqlx::query_as::<_, ReceiptLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM receipt_lines WHERE receipt_id = $1 ORDER BY id"
        ))
        .bind(receipt_id)
        .fetch_all(&self.db)
        .await?;

        Ok(ReceiptWithLines { receipt, lines })
    }

    pub async fn list(&self, source_type: Option<ReceiptSource>) -> AppResult<Vec<Receipt>> {
        let sql = format!(
            r#"
            SELECT {RECEIPT_COLUMNS} FROM receipts
            WHERE ($1::VARCHAR IS NULL OR source_type = $1)
            ORDER BY received_at DESC, id DESC
            "#
        );
        let receipts = sqlx::query_as::<_, Receipt>(&sql)
            .bind(source_type.map(|s| s.as_str()))
            .fetch_all(&self.db)
            .await?;
        Ok(receipts)
    }
}
