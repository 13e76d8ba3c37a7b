//! Scrap documents

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    DocumentRef, InventoryTransactionType, ReferenceType, Scrap, ScrapSource, StockFilter,
};
use crate::services::batch::{consumed_cost, BatchService, ConsumedBatch};
use crate::services::ledger::{self, StockPosting};
use shared::{validate_positive_quantity, DocumentKind, FifoOptions};

const SCRAP_COLUMNS: &str = "id, scrap_number, item_id, location_id, quantity, total_cost, reason, \
     source_type, source_id, scrapped_by, notes, scrap_date";

#[derive(Clone)]
pub struct ScrapService {
    db: PgPool,
    ledger: LedgerConfig,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateScrapInput {
    pub item_id: i64,
    pub location_id: i64,
    pub quantity: Decimal,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    pub source_type: Option<ScrapSource>,
    pub source_id: Option<i64>,
    pub notes: Option<String>,
}

/// Scrap that never entered stock (rejected on receipt, lost in production)
#[derive(Debug, Clone)]
pub struct UnstockedScrap {
    pub item_id: i64,
    pub location_id: i64,
    pub quantity: Decimal,
    pub total_cost: Decimal,
    pub reason: String,
    pub source_type: ScrapSource,
    pub source_id: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScrapWithBatches {
    #[serde(flatten)]
    pub scrap: Scrap,
    pub batches: Vec<ConsumedBatch>,
}

impl ScrapService {
    pub fn new(db: PgPool, ledger: LedgerConfig) -> Self {
        Self { db, ledger }
    }

    /// Write off stock: the quantity is drawn from the oldest batches and
    /// their cost is recorded on the scrap document
    pub async fn create(&self, input: CreateScrapInput, actor: Option<i64>) -> AppResult<ScrapWithBatches> {
        input.validate()?;
        validate_positive_quantity(input.quantity)
            .map_err(|msg| AppError::validation("quantity", msg))?;

        let mut tx = self.db.begin().await?;

        let scrap = Self::insert(
            &mut tx,
            &UnstockedScrap {
                item_id: input.item_id,
                location_id: input.location_id,
                quantity: input.quantity,
                total_cost: Decimal::ZERO,
                reason: input.reason.trim().to_string(),
                source_type: input.source_type.unwrap_or(ScrapSource::Warehouse),
                source_id: input.source_id,
                notes: input.notes.clone(),
            },
            actor,
        )
        .await?;

        let reference = DocumentRef::new(ReferenceType::Scrap, scrap.id);
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

        let scrap = sqlx::query_as::<_, Scrap>(&format!(
            "UPDATE scraps SET total_cost = $2 WHERE id = $1 RETURNING {SCRAP_COLUMNS}"
        ))
        .bind(scrap.id)
        .bind(consumed_cost(&consumed)?)
        .fetch_one(&mut *tx)
        .await?;

        ledger::post_stock(
            &mut tx,
            StockPosting {
                item_id: input.item_id,
                location_id: input.location_id,
                transaction_type: InventoryTransactionType::Scrap,
                quantity: -input.quantity,
                reference: Some(reference),
                notes: Some(scrap.reason.clone().unwrap_or_default()),
            },
            actor,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            scrap_number = %scrap.scrap_number,
            quantity = %scrap.quantity,
            cost = %scrap.total_cost,
            "stock scrapped"
        );

        Ok(ScrapWithBatches {
            scrap,
            batches: consumed,
        })
    }

    /// Record scrap without touching stock
    pub async fn record_unstocked(
        conn: &mut PgConnection,
        input: UnstockedScrap,
        actor: Option<i64>,
    ) -> AppResult<Scrap> {
        let scrap = Self::insert(conn, &input, actor).await?;
        tracing::debug!(scrap_number = %scrap.scrap_number, source = %scrap.source_type, "scrap recorded");
        Ok(scrap)
    }

    async fn insert(conn: &mut PgConnection, input: &UnstockedScrap, actor: Option<i64>) -> AppResult<Scrap> {
        ledger::ensure_exists(conn, "items", input.item_id, "Item").await?;
        ledger::ensure_exists(conn, "locations", input.location_id, "Location").await?;

        let scrap_number = ledger::next_document_number(conn, DocumentKind::Scrap).await?;
        let sql = format!(
            r#"
            INSERT INTO scraps (scrap_number, item_id, location_id, quantity, total_cost, reason,
                                source_type, source_id, scrapped_by, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {SCRAP_COLUMNS}
            "#
        );
        let scrap = sqlx::query_as::<_, Scrap>(&sql)
            .bind(&scrap_number)
            .bind(input.item_id)
            .bind(input.location_id)
            .bind(input.quantity)
            .bind(input.total_cost)
            .bind(&input.reason)
            .bind(input.source_type)
            .bind(input.source_id)
            .bind(actor)
            .bind(&input.notes)
            .fetch_one(&mut *conn)
            .await?;
        Ok(scrap)
    }

    pub async fn get(&self, scrap_id: i64) -> AppResult<ScrapWithBatches> {
        let scrap = sqlx::query_as::<_, Scrap>(&format!("SELECT {SCRAP_COLUMNS} FROM scraps WHERE id = $1"))
            .bind(scrap_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Scrap {}", scrap_id)))?;

        let mut conn = self.db.acquire().await?;
        let batches = BatchService::consumed_by_reference(
            &mut conn,
            DocumentRef::new(ReferenceType::Scrap, scrap.id),
        )
        .await?;

        Ok(ScrapWithBatches { scrap, batches })
    }

    pub async fn list(&self, filter: StockFilter) -> AppResult<Vec<Scrap>> {
        let sql = format!(
            r#"
            SELECT {SCRAP_COLUMNS} FROM scraps
            WHERE ($1::BIGINT IS NULL OR item_id = $1)
              AND ($2::BIGINT IS NULL OR location_id = $2)
            ORDER BY scrap_date DESC, id DESC
            "#
        );
        let scraps = sqlx::query_as::<_, Scrap>(&sql)
            .bind(filter.item_id)
            .bind(filter.location_id)
            .fetch_all(&self.db)
            .await?;
        Ok(scraps)
    }
}
