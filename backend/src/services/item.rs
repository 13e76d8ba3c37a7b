//! Item and location master data

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{Item, Location, LocationType};
use shared::{validate_location_code, validate_sku, validate_unit_cost};

pub(crate) const ITEM_COLUMNS: &str = "id, sku, name, description, unit_of_measure, unit_cost, price, \
     reorder_level, reorder_quantity, is_active, created_at, updated_at";

pub(crate) const LOCATION_COLUMNS: &str =
    "id, code, name, location_type, zone, capacity, is_active, created_at";

/// Item service for master data
#[derive(Clone)]
pub struct ItemService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateItemInput {
    #[validate(length(min = 2, max = 50))]
    pub sku: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub unit_of_measure: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub price: Option<Decimal>,
    pub reorder_level: Option<Decimal>,
    pub reorder_quantity: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub price: Option<Decimal>,
    pub reorder_level: Option<Decimal>,
    pub reorder_quantity: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLocationInput {
    #[validate(length(min = 2, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub location_type: Option<LocationType>,
    pub zone: Option<String>,
    pub capacity: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemListQuery {
    /// Matches SKU or name
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

fn check_costs(unit_cost: Option<Decimal>, price: Option<Decimal>) -> AppResult<()> {
    if let Some(cost) = unit_cost {
        validate_unit_cost(cost).map_err(|msg| AppError::validation("unit_cost", msg))?;
    }
    if let Some(price) = price {
        validate_unit_cost(price).map_err(|msg| AppError::validation("price", msg))?;
    }
    Ok(())
}

impl ItemService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_item(&self, input: CreateItemInput) -> AppResult<Item> {
        input.validate()?;
        let sku = input.sku.trim().to_uppercase();
        validate_sku(&sku).map_err(|msg| AppError::validation("sku", msg))?;
        check_costs(input.unit_cost, input.price)?;

        let sql = format!(
            r#"
            INSERT INTO items (sku, name, description, unit_of_measure, unit_cost, price,
                               reorder_level, reorder_quantity)
            VALUES ($1, $2, $3, COALESCE($4, 'pcs'), COALESCE($5, 0), COALESCE($6, 0),
                    COALESCE($7, 0), COALESCE($8, 0))
            RETURNING {ITEM_COLUMNS}
            "#
        );

        let item = sqlx::query_as::<_, Item>(&sql)
            .bind(&sku)
            .bind(input.name.trim())
            .bind(&input.description)
            .bind(&input.unit_of_measure)
            .bind(input.unit_cost)
            .bind(input.price)
            .bind(input.reorder_level)
            .bind(input.reorder_quantity)
            .fetch_one(&self.db)
            .await
            .map_err(AppError::unique_violation("sku"))?;

        tracing::info!(sku = %item.sku, id = item.id, "item created");
        Ok(item)
    }

    pub async fn update_item(&self, item_id: i64, input: UpdateItemInput) -> AppResult<Item> {
        input.validate()?;
        check_costs(input.unit_cost, input.price)?;

        let sql = format!(
            r#"
            UPDATE items SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                unit_cost = COALESCE($4, unit_cost),
                price = COALESCE($5, price),
                reorder_level = COALESCE($6, reorder_level),
                reorder_quantity = COALESCE($7, reorder_quantity),
                is_active = COALESCE($8, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Item>(&sql)
            .bind(item_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.unit_cost)
            .bind(input.price)
            .bind(input.reorder_level)
            .bind(input.reorder_quantity)
            .bind(input.is_active)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {}", item_id)))
    }

    pub async fn get_item(&self, item_id: i64) -> AppResult<Item> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1");
        sqlx::query_as::<_, Item>(&sql)
            .bind(item_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {}", item_id)))
    }

    pub async fn list_items(&self, query: ItemListQuery) -> AppResult<Vec<Item>> {
        let pattern = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let sql = format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE ($1::TEXT IS NULL OR sku ILIKE $1 OR name ILIKE $1)
              AND ($2 OR is_active)
            ORDER BY sku
            "#
        );

        let items = sqlx::query_as::<_, Item>(&sql)
            .bind(pattern)
            .bind(query.include_inactive)
            .fetch_all(&self.db)
            .await?;

        Ok(items)
    }

    pub async fn create_location(&self, input: CreateLocationInput) -> AppResult<Location> {
        input.validate()?;
        let code = input.code.trim().to_uppercase();
        validate_location_code(&code).map_err(|msg| AppError::validation("code", msg))?;
        if matches!(input.capacity, Some(c) if c < Decimal::ZERO) {
            return Err(AppError::validation("capacity", "Capacity cannot be negative"));
        }

        let sql = format!(
            r#"
            INSERT INTO locations (code, name, location_type, zone, capacity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {LOCATION_COLUMNS}
            "#
        );

        let location = sqlx::query_as::<_, Location>(&sql)
            .bind(&code)
            .bind(input.name.trim())
            .bind(input.location_type.unwrap_or(LocationType::Warehouse))
            .bind(&input.zone)
            .bind(input.capacity)
            .fetch_one(&self.db)
            .await
            .map_err(AppError::unique_violation("code"))?;

        tracing::info!(code = %location.code, id = location.id, "location created");
        Ok(location)
    }

    pub async fn get_location(&self, location_id: i64) -> AppResult<Location> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = $1");
        sqlx::query_as::<_, Location>(&sql)
            .bind(location_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Location {}", location_id)))
    }

    pub async fn list_locations(&self) -> AppResult<Vec<Location>> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE is_active ORDER BY code");
        let locations = sqlx::query_as::<_, Location>(&sql).fetch_all(&self.db).await?;
        Ok(locations)
    }
}
