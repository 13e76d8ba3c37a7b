//! Outbound shipments

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    DocumentRef, InventoryTransactionType, ReferenceType, Shipment, ShipmentLine, ShipmentStatus,
    StatusFlow,
};
use crate::services::batch::{consumed_cost, BatchService, ConsumedBatch};
use crate::services::ledger::{self, StockPosting};
use shared::{checked_total, validate_positive_quantity, DocumentKind, FifoOptions};

const SHIPMENT_COLUMNS: &str = "id, shipment_number, from_location_id, customer_name, shipping_address, \
     tracking_number, ship_date, status, notes, created_by, created_at";

#[derive(Clone)]
pub struct ShipmentService {
    db: PgPool,
    ledger: LedgerConfig,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateShipmentInput {
    pub from_location_id: i64,
    #[validate(length(max = 200))]
    pub customer_name: Option<String>,
    pub shipping_address: Option<String>,
    #[validate(length(max = 100))]
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<ShipmentLineInput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShipmentLineInput {
    pub item_id: i64,
    pub quantity: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShipShipmentInput {
    pub tracking_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ShipmentWithLines {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub lines: Vec<ShipmentLine>,
    /// Batches drawn for all lines, in draw order
    pub batches: Vec<ConsumedBatch>,
    /// Cost of goods sold
    pub total_cost: Decimal,
}

impl ShipmentService {
    pub fn new(db: PgPool, ledger: LedgerConfig) -> Self {
        Self { db, ledger }
    }

    /// Create a shipment; every line draws its stock by FIFO and keeps the
    /// drawn cost
    pub async fn create(&self, input: CreateShipmentInput, actor: Option<i64>) -> AppResult<ShipmentWithLines> {
        input.validate()?;
        for line in &input.lines {
            validate_positive_quantity(line.quantity)
                .map_err(|msg| AppError::validation("lines.quantity", msg))?;
        }

        let mut tx = self.db.begin().await?;
        ledger::ensure_exists(&mut tx, "locations", input.from_location_id, "Location").await?;

        let shipment_number = ledger::next_document_number(&mut tx, DocumentKind::Shipment).await?;
        let sql = format!(
            r#"
            INSERT INTO shipments (shipment_number, from_location_id, customer_name, shipping_address,
                                   tracking_number, status, notes, created_by)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7)
            RETURNING {SHIPMENT_COLUMNS}
            "#
        );
        let shipment = sqlx::query_as::<_, Shipment>(&sql)
            .bind(&shipment_number)
            .bind(input.from_location_id)
            .bind(&input.customer_name)
            .bind(&input.shipping_address)
            .bind(&input.tracking_number)
            .bind(&input.notes)
            .bind(actor)
            .fetch_one(&mut *tx)
            .await?;

        let reference = DocumentRef::new(ReferenceType::Shipment, shipment.id);
        let options = FifoOptions {
            now: Utc::now(),
            exclude_expired: self.ledger.exclude_expired,
        };

        let mut lines = Vec::with_capacity(input.lines.len());
        let mut batches = Vec::new();
        for line in &input.lines {
            ledger::ensure_exists(&mut tx, "items", line.item_id, "Item").await?;

            let consumed = BatchService::consume_fifo(
                &mut tx,
                line.item_id,
                input.from_location_id,
                line.quantity,
                reference,
                options,
                actor,
            )
            .await?;

            let row = sqlx::query_as::<_, ShipmentLine>(
                r#"
                INSERT INTO shipment_lines (shipment_id, item_id, quantity, total_cost, notes)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, shipment_id, item_id, quantity, total_cost, notes
                "#,
            )
            .bind(shipment.id)
            .bind(line.item_id)
            .bind(line.quantity)
            .bind(consumed_cost(&consumed)?)
            .bind(&line.notes)
            .fetch_one(&mut *tx)
            .await?;

            ledger::post_stock(
                &mut tx,
                StockPosting {
                    item_id: line.item_id,
                    location_id: input.from_location_id,
                    transaction_type: InventoryTransactionType::Shipment,
                    quantity: -line.quantity,
                    reference: Some(reference),
                    notes: shipment.customer_name.clone(),
                },
                actor,
            )
            .await?;

            lines.push(row);
            batches.extend(consumed);
        }

        let total_cost = checked_total(lines.iter().map(|l| l.total_cost), "shipment cost")?;
        tx.commit().await?;

        tracing::info!(
            shipment_number = %shipment.shipment_number,
            lines = lines.len(),
            cogs = %total_cost,
            "shipment created"
        );

        Ok(ShipmentWithLines {
            shipment,
            lines,
            batches,
            total_cost,
        })
    }

    pub async fn ship(&self, shipment_id: i64, input: ShipShipmentInput) -> AppResult<Shipment> {
        self.change_status(shipment_id, ShipmentStatus::Shipped, input.tracking_number)
            .await
    }

    pub async fn deliver(&self, shipment_id: i64) -> AppResult<Shipment> {
        self.change_status(shipment_id, ShipmentStatus::Delivered, None).await
    }

    /// Cancel a pending shipment. Stock already drawn stays drawn; returns
    /// come back through a manual receipt.
    pub async fn cancel(&self, shipment_id: i64) -> AppResult<Shipment> {
        self.change_status(shipment_id, ShipmentStatus::Cancelled, None).await
    }

    async fn change_status(
        &self,
        shipment_id: i64,
        next: ShipmentStatus,
        tracking_number: Option<String>,
    ) -> AppResult<Shipment> {
        let mut tx = self.db.begin().await?;
        let shipment = Self::fetch(&mut tx, shipment_id, true).await?;
        let next = shipment.status.transition(next)?;

        let sql = format!(
            r#"
            UPDATE shipments
            SET status = $2, tracking_number = COALESCE($3, tracking_number)
            WHERE id = $1
            RETURNING {SHIPMENT_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, Shipment>(&sql)
            .bind(shipment_id)
            .bind(next)
            .bind(tracking_number)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(shipment_number = %updated.shipment_number, status = %updated.status, "shipment status changed");
        Ok(updated)
    }

    async fn fetch(conn: &mut PgConnection, shipment_id: i64, lock: bool) -> AppResult<Shipment> {
        let sql = format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, Shipment>(&sql)
            .bind(shipment_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Shipment {}", shipment_id)))
    }

    pub async fn get(&self, shipment_id: i64) -> AppResult<ShipmentWithLines> {
        let mut conn = self.db.acquire().await?;
        let shipment = Self::fetch(&mut conn, shipment_id, false).await?;

        let lines = sqlx::query_as::<_, ShipmentLine>(
            r#"
            SELECT id, shipment_id, item_id, quantity, total_cost, notes
            FROM shipment_lines
            WHERE shipment_id = $1
            ORDER BY id
            "#,
        )
        .bind(shipment_id)
        .fetch_all(&mut *conn)
        .await?;

        let batches = BatchService::consumed_by_reference(
            &mut conn,
            DocumentRef::new(ReferenceType::Shipment, shipment.id),
        )
        .await?;
        let total_cost = checked_total(lines.iter().map(|l| l.total_cost), "shipment cost")?;

        Ok(ShipmentWithLines {
            shipment,
            lines,
            batches,
            total_cost,
        })
    }

    pub async fn list(&self, status: Option<ShipmentStatus>) -> AppResult<Vec<Shipment>> {
        let sql = format!(
            r#"
            SELECT {SHIPMENT_COLUMNS} FROM shipments
            WHERE ($1::VARCHAR IS NULL OR status = $1)
            ORDER BY ship_date DESC, id DESC
            "#
        );
        let shipments = sqlx::query_as::<_, Shipment>(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.db)
            .await?;
        Ok(shipments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipment_needs_at_least_one_line() {
        let mut input = CreateShipmentInput {
            from_location_id: 1,
            customer_name: Some("Northwind".to_string()),
            shipping_address: None,
            tracking_number: None,
            notes: None,
            lines: vec![],
        };
        assert!(input.validate().is_err());

        input.lines.push(ShipmentLineInput {
            item_id: 1,
            quantity: Decimal::from(5),
            notes: None,
        });
        assert!(input.validate().is_ok());
    }
}
