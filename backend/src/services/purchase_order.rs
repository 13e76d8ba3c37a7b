//! Purchase orders

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{PurchaseOrder, PurchaseOrderLine, PurchaseOrderStatus, StatusFlow};
use crate::services::ledger;
use shared::{
    checked_product, checked_total, validate_positive_quantity, validate_unit_cost, DocumentKind, LedgerResult,
};

pub(crate) const PO_COLUMNS: &str = "id, po_number, supplier_name, status, order_date, expected_date, \
     total_amount, notes, created_by, created_at, updated_at";

#[derive(Clone)]
pub struct PurchaseOrderService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePurchaseOrderInput {
    #[validate(length(min = 1, max = 200))]
    pub supplier_name: String,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub lines: Vec<PurchaseOrderLineInput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseOrderLineInput {
    pub item_id: i64,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PurchaseOrderWithLines {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub lines: Vec<PurchaseOrderLine>,
}

/// Ordered value of all lines at their unit price
pub fn order_total(lines: &[PurchaseOrderLineInput]) -> LedgerResult<Decimal> {
    let line_totals = lines
        .iter()
        .map(|l| checked_product(l.quantity, l.unit_price, "order line total"))
        .collect::<LedgerResult<Vec<_>>>()?;
    checked_total(line_totals, "order total")
}

impl PurchaseOrderService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        input: CreatePurchaseOrderInput,
        actor: Option<i64>,
    ) -> AppResult<PurchaseOrderWithLines> {
        input.validate()?;
        for line in &input.lines {
            validate_positive_quantity(line.quantity)
                .map_err(|msg| AppError::validation("lines.quantity", msg))?;
            validate_unit_cost(line.unit_price)
                .map_err(|msg| AppError::validation("lines.unit_price", msg))?;
        }
        let total = order_total(&input.lines)?;

        let mut tx = self.db.begin().await?;

        let po_number = ledger::next_document_number(&mut tx, DocumentKind::PurchaseOrder).await?;
        let sql = format!(
            r#"
            INSERT INTO purchase_orders (po_number, supplier_name, status, expected_date, total_amount, notes, created_by)
            VALUES ($1, $2, 'draft', $3, $4, $5, $6)
            RETURNING {PO_COLUMNS}
            "#
        );
        let order = sqlx::query_as::<_, PurchaseOrder>(&sql)
            .bind(&po_number)
            .bind(input.supplier_name.trim())
            .bind(input.expected_date)
            .bind(total)
            .bind(&input.notes)
            .bind(actor)
            .fetch_one(&mut *tx)
            .await?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            ledger::ensure_exists(&mut tx, "items", line.item_id, "Item").await?;
            let row = sqlx::query_as::<_, PurchaseOrderLine>(
                r#"
                INSERT INTO purchase_order_lines (po_id, item_id, quantity_ordered, unit_price)
                VALUES ($1, $2, $3, $4)
                RETURNING id, po_id, item_id, quantity_ordered, quantity_received, unit_price
                "#,
            )
            .bind(order.id)
            .bind(line.item_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .fetch_one(&mut *tx)
            .await?;
            lines.push(row);
        }

        tx.commit().await?;

        tracing::info!(po_number = %order.po_number, total = %order.total_amount, "purchase order created");
        Ok(PurchaseOrderWithLines { order, lines })
    }

    pub async fn get(&self, po_id: i64) -> AppResult<PurchaseOrderWithLines> {
        let mut conn = self.db.acquire().await?;
        let order = Self::fetch(&mut conn, po_id, false).await?;
        let lines = Self::lines(&mut conn, po_id).await?;
        Ok(PurchaseOrderWithLines { order, lines })
    }

    pub async fn list(&self, status: Option<PurchaseOrderStatus>) -> AppResult<Vec<PurchaseOrder>> {
        let sql = format!(
            "SELECT {PO_COLUMNS} FROM purchase_orders WHERE ($1::VARCHAR IS NULL OR status = $1) ORDER BY id DESC"
        );
        let orders = sqlx::query_as::<_, PurchaseOrder>(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.db)
            .await?;
        Ok(orders)
    }

    pub async fn submit(&self, po_id: i64) -> AppResult<PurchaseOrder> {
        self.change_status(po_id, PurchaseOrderStatus::Submitted).await
    }

    pub async fn cancel(&self, po_id: i64) -> AppResult<PurchaseOrder> {
        self.change_status(po_id, PurchaseOrderStatus::Cancelled).await
    }

    async fn change_status(&self, po_id: i64, next: PurchaseOrderStatus) -> AppResult<PurchaseOrder> {
        let mut tx = self.db.begin().await?;
        let order = Self::fetch(&mut tx, po_id, true).await?;
        let next = order.status.transition(next)?;
        let updated = Self::set_status(&mut tx, po_id, next).await?;
        tx.commit().await?;

        tracing::info!(po_number = %updated.po_number, status = %updated.status, "purchase order status changed");
        Ok(updated)
    }

    pub(crate) async fn fetch(conn: &mut PgConnection, po_id: i64, lock: bool) -> AppResult<PurchaseOrder> {
        let sql = format!(
            "SELECT {PO_COLUMNS} FROM purchase_orders WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, PurchaseOrder>(&sql)
            .bind(po_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Purchase order {}", po_id)))
    }

    pub(crate) async fn lines(conn: &mut PgConnection, po_id: i64) -> AppResult<Vec<PurchaseOrderLine>> {
        let lines = sqlx::query_as::<_, PurchaseOrderLine>(
            r#"
            SELECT id, po_id, item_id, quantity_ordered, quantity_received, unit_price
            FROM purchase_order_lines
            WHERE po_id = $1
            ORDER BY id
            "#,
        )
        .bind(po_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(lines)
    }

    async fn set_status(
        conn: &mut PgConnection,
        po_id: i64,
        status: PurchaseOrderStatus,
    ) -> AppResult<PurchaseOrder> {
        let sql = format!(
            "UPDATE purchase_orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {PO_COLUMNS}"
        );
        let order = sqlx::query_as::<_, PurchaseOrder>(&sql)
            .bind(po_id)
            .bind(status)
            .fetch_one(&mut *conn)
            .await?;
        Ok(order)
    }

    /// Book a received quantity against the first open line for the item and
    /// return that line's unit price
    pub(crate) async fn receive_line(
        conn: &mut PgConnection,
        po_id: i64,
        item_id: i64,
        quantity: Decimal,
    ) -> AppResult<Decimal> {
        let line = sqlx::query_as::<_, (i64, Decimal)>(
            r#"
            SELECT id, unit_price FROM purchase_order_lines
            WHERE po_id = $1 AND item_id = $2
            ORDER BY (quantity_received >= quantity_ordered), id
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(po_id)
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some((line_id, unit_price)) = line else {
            return Err(AppError::validation(
                "lines.item_id",
                format!("Item {} is not on purchase order {}", item_id, po_id),
            ));
        };

        sqlx::query(
            "UPDATE purchase_order_lines SET quantity_received = quantity_received + $2 WHERE id = $1",
        )
        .bind(line_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        Ok(unit_price)
    }

    /// Recompute the order status from its lines after a receipt
    pub(crate) async fn refresh_status(conn: &mut PgConnection, po_id: i64) -> AppResult<PurchaseOrderStatus> {
        let order = Self::fetch(conn, po_id, true).await?;
        let lines = Self::lines(conn, po_id).await?;
        let pairs: Vec<(Decimal, Decimal)> = lines
            .iter()
            .map(|l| (l.quantity_ordered, l.quantity_received))
            .collect();

        let next = PurchaseOrderStatus::after_receipt(&pairs);
        if next != order.status {
            let next = order.status.transition(next)?;
            Self::set_status(conn, po_id, next).await?;
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: &str, unit_price: &str) -> PurchaseOrderLineInput {
        PurchaseOrderLineInput {
            item_id: 1,
            quantity: quantity.parse().unwrap(),
            unit_price: unit_price.parse().unwrap(),
        }
    }

    #[test]
    fn order_total_sums_line_values() {
        let lines = vec![line("10", "2.5"), line("4", "3")];
        assert_eq!(order_total(&lines), Ok(Decimal::from(37)));
    }

    #[test]
    fn oversized_order_line_is_rejected() {
        let lines = vec![line("2", "79228162514264337593543950335")];
        assert_eq!(
            order_total(&lines),
            Err(shared::LedgerError::Overflow("order line total"))
        );
    }

    #[test]
    fn order_needs_at_least_one_line() {
        let input = CreatePurchaseOrderInput {
            supplier_name: "Acme Metals".to_string(),
            expected_date: None,
            notes: None,
            lines: vec![],
        };
        assert!(input.validate().is_err());

        let input = CreatePurchaseOrderInput {
            lines: vec![line("1", "1")],
            ..input
        };
        assert!(input.validate().is_ok());
    }
}
