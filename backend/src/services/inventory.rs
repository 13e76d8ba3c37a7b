//! Inventory queries: stock on hand, movements, valuation and ledger checks

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{InventoryLevel, InventoryTransaction, InventoryTransactionType, Item, Location, StockFilter};
use crate::services::item::{ITEM_COLUMNS, LOCATION_COLUMNS};
use shared::{checked_total, unit_cost, DateRange, OwnershipType, PaginatedResponse, Pagination};

/// Ownership types whose batches count toward inventory value
fn valued_ownership() -> Vec<&'static str> {
    OwnershipType::ALL
        .iter()
        .filter(|o| o.counts_toward_valuation())
        .map(|o| o.as_str())
        .collect()
}

/// Inventory query service
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    ledger: LedgerConfig,
}

/// Stock of one item at one location
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LocationStock {
    pub location_id: i64,
    pub location_code: String,
    pub location_name: String,
    pub quantity: Decimal,
    pub bin_location: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ItemStock {
    pub item: Item,
    pub locations: Vec<LocationStock>,
    pub total_quantity: Decimal,
    pub needs_reorder: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub item_id: Option<i64>,
    pub location_id: Option<i64>,
    pub transaction_type: Option<InventoryTransactionType>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl TransactionQuery {
    fn pagination(&self) -> Pagination {
        let defaults = Pagination::default();
        Pagination {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }

    fn range(&self) -> DateRange {
        DateRange {
            start: self.start,
            end: self.end,
        }
    }
}

/// Value of the owned stock of one item
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ItemValuation {
    pub item_id: i64,
    pub sku: String,
    pub name: String,
    pub quantity: Decimal,
    pub value: Decimal,
    #[sqlx(skip)]
    pub average_unit_cost: Decimal,
}

#[derive(Debug, Serialize)]
pub struct InventoryValuation {
    pub currency: String,
    pub location_id: Option<i64>,
    pub items: Vec<ItemValuation>,
    pub total_value: Decimal,
}

#[derive(Debug, Serialize)]
pub struct LowStockItem {
    pub item: Item,
    pub on_hand: Decimal,
    /// Quantity needed to get back to the reorder level
    pub shortfall: Decimal,
}

#[derive(Debug, Serialize)]
pub struct LocationCapacity {
    pub location: Location,
    pub current_quantity: Decimal,
    pub capacity_percentage: Option<Decimal>,
    pub over_capacity: bool,
}

/// Item/location pair whose on-hand level differs from its batches
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LedgerDiscrepancy {
    pub item_id: i64,
    pub location_id: i64,
    pub level_quantity: Decimal,
    pub batch_quantity: Decimal,
    pub difference: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ConsistencyReport {
    pub checked_at: DateTime<Utc>,
    pub consistent: bool,
    pub discrepancies: Vec<LedgerDiscrepancy>,
}

#[derive(Debug, FromRow)]
struct OnHandRow {
    item_id: i64,
    on_hand: Decimal,
}

impl InventoryService {
    pub fn new(db: PgPool, ledger: LedgerConfig) -> Self {
        Self { db, ledger }
    }

    /// On-hand stock of an item per location
    pub async fn stock_by_item(&self, item_id: i64) -> AppResult<ItemStock> {
        let item = sqlx::query_as::<_, Item>(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(item_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {}", item_id)))?;

        let locations = sqlx::query_as::<_, LocationStock>(
            r#"
            SELECT l.id AS location_id, l.code AS location_code, l.name AS location_name,
                   il.quantity, il.bin_location
            FROM inventory_levels il
            JOIN locations l ON l.id = il.location_id
            WHERE il.item_id = $1 AND il.quantity > 0
            ORDER BY l.code
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        let total_quantity = checked_total(locations.iter().map(|l| l.quantity), "stock on hand")?;
        Ok(ItemStock {
            needs_reorder: item.needs_reorder(total_quantity),
            item,
            locations,
            total_quantity,
        })
    }

    pub async fn stock_levels(&self, filter: StockFilter) -> AppResult<Vec<InventoryLevel>> {
        let levels = sqlx::query_as::<_, InventoryLevel>(
            r#"
            SELECT id, item_id, location_id, quantity, bin_location, updated_at
            FROM inventory_levels
            WHERE ($1::BIGINT IS NULL OR item_id = $1)
              AND ($2::BIGINT IS NULL OR location_id = $2)
            ORDER BY item_id, location_id
            "#,
        )
        .bind(filter.item_id)
        .bind(filter.location_id)
        .fetch_all(&self.db)
        .await?;
        Ok(levels)
    }

    /// Inventory transactions, newest first
    pub async fn transactions(&self, query: TransactionQuery) -> AppResult<PaginatedResponse<InventoryTransaction>> {
        let pagination = query.pagination();
        let range = query.range();
        let kind = query.transaction_type.map(|t| t.as_str());

        const FILTER: &str = r#"
            WHERE ($1::BIGINT IS NULL OR item_id = $1)
              AND ($2::BIGINT IS NULL OR location_id = $2)
              AND ($3::VARCHAR IS NULL OR transaction_type = $3)
              AND ($4::TIMESTAMPTZ IS NULL OR created_at >= $4)
              AND ($5::TIMESTAMPTZ IS NULL OR created_at <= $5)
        "#;

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM inventory_transactions {FILTER}"))
            .bind(query.item_id)
            .bind(query.location_id)
            .bind(kind)
            .bind(range.start)
            .bind(range.end)
            .fetch_one(&self.db)
            .await?;

        let sql = format!(
            r#"
            SELECT id, item_id, location_id, transaction_type, quantity, reference_type, reference_id,
                   notes, created_by, created_at
            FROM inventory_transactions
            {FILTER}
            ORDER BY created_at DESC, id DESC
            LIMIT $6 OFFSET $7
            "#
        );
        let rows = sqlx::query_as::<_, InventoryTransaction>(&sql)
            .bind(query.item_id)
            .bind(query.location_id)
            .bind(kind)
            .bind(range.start)
            .bind(range.end)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.db)
            .await?;

        Ok(PaginatedResponse::new(rows, pagination, total.max(0) as u64))
    }

    /// Value of stock the business owns, at batch cost. Consignment and lohn
    /// batches are held for others and left out.
    pub async fn valuation(&self, location_id: Option<i64>) -> AppResult<InventoryValuation> {
        let mut items = sqlx::query_as::<_, ItemValuation>(
            r#"
            SELECT i.id AS item_id, i.sku, i.name,
                   SUM(b.quantity_available) AS quantity,
                   SUM(b.quantity_available * b.unit_cost) AS value
            FROM batches b
            JOIN items i ON i.id = b.item_id
            WHERE b.ownership_type = ANY($2)
              AND b.quantity_available > 0
              AND ($1::BIGINT IS NULL OR b.location_id = $1)
            GROUP BY i.id, i.sku, i.name
            ORDER BY i.sku
            "#,
        )
        .bind(location_id)
        .bind(valued_ownership())
        .fetch_all(&self.db)
        .await?;

        for row in &mut items {
            row.average_unit_cost = unit_cost(row.value, row.quantity)?;
        }
        let total_value = checked_total(items.iter().map(|i| i.value), "inventory value")?;

        Ok(InventoryValuation {
            currency: self.ledger.currency.clone(),
            location_id,
            items,
            total_value,
        })
    }

    /// Active items at or below their reorder level
    pub async fn low_stock(&self) -> AppResult<Vec<LowStockItem>> {
        let items = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE is_active = TRUE AND reorder_level > 0 ORDER BY sku"
        ))
        .fetch_all(&self.db)
        .await?;

        let on_hand = sqlx::query_as::<_, OnHandRow>(
            "SELECT item_id, SUM(quantity) AS on_hand FROM inventory_levels GROUP BY item_id",
        )
        .fetch_all(&self.db)
        .await?;

        let low = items
            .into_iter()
            .filter_map(|item| {
                let qty = on_hand
                    .iter()
                    .find(|r| r.item_id == item.id)
                    .map_or(Decimal::ZERO, |r| r.on_hand);
                item.needs_reorder(qty).then(|| LowStockItem {
                    shortfall: item.reorder_level - qty,
                    on_hand: qty,
                    item,
                })
            })
            .collect();
        Ok(low)
    }

    pub async fn location_capacity(&self, location_id: i64) -> AppResult<LocationCapacity> {
        let location = sqlx::query_as::<_, Location>(&format!(
            "SELECT {LOCATION_COLUMNS} FROM locations WHERE id = $1"
        ))
        .bind(location_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Location {}", location_id)))?;

        let current: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM inventory_levels WHERE location_id = $1",
        )
        .bind(location_id)
        .fetch_one(&self.db)
        .await?;

        Ok(LocationCapacity {
            capacity_percentage: location.capacity_percentage(current),
            over_capacity: location.is_over_capacity(current),
            current_quantity: current,
            location,
        })
    }

    /// Compare every on-hand level with the remaining quantity of its batches
    pub async fn consistency_check(&self, filter: StockFilter) -> AppResult<ConsistencyReport> {
        let discrepancies = sqlx::query_as::<_, LedgerDiscrepancy>(
            r#"
            WITH levels AS (
                SELECT item_id, location_id, quantity
                FROM inventory_levels
            ),
            lots AS (
                SELECT item_id, location_id, SUM(quantity_available) AS quantity
                FROM batches
                WHERE quantity_available > 0
                GROUP BY item_id, location_id
            )
            SELECT COALESCE(l.item_id, b.item_id) AS item_id,
                   COALESCE(l.location_id, b.location_id) AS location_id,
                   COALESCE(l.quantity, 0) AS level_quantity,
                   COALESCE(b.quantity, 0) AS batch_quantity,
                   COALESCE(l.quantity, 0) - COALESCE(b.quantity, 0) AS difference
            FROM levels l
            FULL OUTER JOIN lots b ON b.item_id = l.item_id AND b.location_id = l.location_id
            WHERE COALESCE(l.quantity, 0) <> COALESCE(b.quantity, 0)
              AND ($1::BIGINT IS NULL OR COALESCE(l.item_id, b.item_id) = $1)
              AND ($2::BIGINT IS NULL OR COALESCE(l.location_id, b.location_id) = $2)
            ORDER BY 1, 2
            "#,
        )
        .bind(filter.item_id)
        .bind(filter.location_id)
        .fetch_all(&self.db)
        .await?;

        if !discrepancies.is_empty() {
            tracing::warn!(count = discrepancies.len(), "inventory levels disagree with batch ledger");
        }

        Ok(ConsistencyReport {
            checked_at: Utc::now(),
            consistent: discrepancies.is_empty(),
            discrepancies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_query_defaults_to_first_page() {
        let query = TransactionQuery::default();
        let p = query.pagination();
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, 50);
        assert!(query.range().start.is_none());
    }

    #[test]
    fn transaction_query_keeps_requested_page() {
        let query = TransactionQuery {
            page: Some(3),
            per_page: Some(10),
            ..Default::default()
        };
        assert_eq!(query.pagination().offset(), 20);
    }

    #[test]
    fn valuation_covers_owned_stock_only() {
        assert_eq!(valued_ownership(), vec!["owned"]);
    }
}
