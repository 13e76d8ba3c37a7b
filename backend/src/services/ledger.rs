//! Document numbering, inventory levels and the item-level audit trail
//!
//! These helpers run on a connection borrowed from the caller's transaction,
//! so a failed document leaves no trace of its numbers or stock postings.

use rust_decimal::Decimal;
use sqlx::PgConnection;

use crate::error::{AppError, AppResult};
use crate::models::{DocumentRef, InventoryTransactionType};
use shared::{checked_total, DocumentKind};

fn document_column(kind: DocumentKind) -> (&'static str, &'static str) {
    match kind {
        DocumentKind::Batch => ("batches", "batch_number"),
        DocumentKind::Receipt => ("receipts", "receipt_number"),
        DocumentKind::Shipment => ("shipments", "shipment_number"),
        DocumentKind::Scrap => ("scraps", "scrap_number"),
        DocumentKind::ExternalProcess => ("external_processes", "process_number"),
        DocumentKind::PurchaseOrder => ("purchase_orders", "po_number"),
        DocumentKind::ProductionOrder => ("production_orders", "order_number"),
        DocumentKind::StockMovement => ("stock_movements", "movement_number"),
        DocumentKind::Adjustment => ("stock_adjustments", "adjustment_number"),
        DocumentKind::Bom => ("boms", "bom_number"),
    }
}

/// Next free number for `kind`.
///
/// Takes a transaction-scoped advisory lock on the document table so two
/// concurrent documents cannot draw the same number.
pub async fn next_document_number(conn: &mut PgConnection, kind: DocumentKind) -> AppResult<String> {
    let (table, column) = document_column(kind);

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(table)
        .execute(&mut *conn)
        .await?;

    let sql = format!(
        "SELECT {column} FROM {table} WHERE {column} ~ $1 \
         ORDER BY LENGTH({column}) DESC, {column} DESC LIMIT 1"
    );
    let last: Option<String> = sqlx::query_scalar(&sql)
        .bind(kind.sql_pattern())
        .fetch_optional(&mut *conn)
        .await?;

    Ok(kind.next_after(last.as_deref()))
}

/// Add `delta` to the on-hand quantity of an item at a location.
///
/// The level row is created on first use and locked for the rest of the
/// transaction. Returns the new quantity; a result below zero is refused.
pub async fn adjust_inventory_level(
    conn: &mut PgConnection,
    item_id: i64,
    location_id: i64,
    delta: Decimal,
) -> AppResult<Decimal> {
    sqlx::query(
        r#"
        INSERT INTO inventory_levels (item_id, location_id, quantity)
        VALUES ($1, $2, 0)
        ON CONFLICT (item_id, location_id) DO NOTHING
        "#,
    )
    .bind(item_id)
    .bind(location_id)
    .execute(&mut *conn)
    .await?;

    let (level_id, current) = sqlx::query_as::<_, (i64, Decimal)>(
        r#"
        SELECT id, quantity FROM inventory_levels
        WHERE item_id = $1 AND location_id = $2
        FOR UPDATE
        "#,
    )
    .bind(item_id)
    .bind(location_id)
    .fetch_one(&mut *conn)
    .await?;

    let updated = checked_total([current, delta], "inventory level")?;
    if updated < Decimal::ZERO {
        return Err(AppError::InsufficientInventory(format!(
            "item {} at location {}: on hand {}, change {}",
            item_id, location_id, current, delta
        )));
    }

    sqlx::query("UPDATE inventory_levels SET quantity = $2, updated_at = NOW() WHERE id = $1")
        .bind(level_id)
        .bind(updated)
        .execute(&mut *conn)
        .await?;

    Ok(updated)
}

/// An item-level stock posting
#[derive(Debug, Clone)]
pub struct StockPosting {
    pub item_id: i64,
    pub location_id: i64,
    pub transaction_type: InventoryTransactionType,
    /// Signed: positive adds stock
    pub quantity: Decimal,
    pub reference: Option<DocumentRef>,
    pub notes: Option<String>,
}

/// Adjust the inventory level and write the matching inventory transaction
pub async fn post_stock(
    conn: &mut PgConnection,
    posting: StockPosting,
    actor: Option<i64>,
) -> AppResult<Decimal> {
    let on_hand =
        adjust_inventory_level(conn, posting.item_id, posting.location_id, posting.quantity).await?;

    sqlx::query(
        r#"
        INSERT INTO inventory_transactions
            (item_id, location_id, transaction_type, quantity, reference_type, reference_id, notes, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(posting.item_id)
    .bind(posting.location_id)
    .bind(posting.transaction_type)
    .bind(posting.quantity)
    .bind(posting.reference.map(|r| r.reference_type.as_str()))
    .bind(posting.reference.map(|r| r.reference_id))
    .bind(&posting.notes)
    .bind(actor)
    .execute(&mut *conn)
    .await?;

    tracing::debug!(
        item_id = posting.item_id,
        location_id = posting.location_id,
        quantity = %posting.quantity,
        kind = %posting.transaction_type,
        on_hand = %on_hand,
        "stock posted"
    );

    Ok(on_hand)
}

/// Fail with `NotFound` unless the row exists
pub async fn ensure_exists(
    conn: &mut PgConnection,
    table: &'static str,
    id: i64,
    label: &str,
) -> AppResult<()> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)");
    let exists: bool = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *conn).await?;
    if !exists {
        return Err(AppError::NotFound(format!("{} {}", label, id)));
    }
    Ok(())
}
