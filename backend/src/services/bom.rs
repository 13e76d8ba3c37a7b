//! Bills of materials

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{BillOfMaterials, BomComponent, BomStatus, StatusFlow};
use crate::services::ledger;
use shared::{
    bom_standard_cost, checked_product, validate_positive_quantity, validate_scrap_factor, DocumentKind,
    LedgerResult,
};

pub(crate) const BOM_COLUMNS: &str = "id, bom_number, finished_item_id, version, status, \
     production_time_minutes, scrap_factor, notes, created_by, created_at, updated_at, activated_at";

const COMPONENT_COLUMNS: &str =
    "id, bom_id, component_item_id, quantity, unit_of_measure, sequence, is_optional, notes";

#[derive(Clone)]
pub struct BomService {
    db: PgPool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBomInput {
    pub finished_item_id: i64,
    #[validate(length(min = 1, max = 20))]
    pub version: Option<String>,
    #[validate(range(min = 0))]
    pub production_time_minutes: Option<i32>,
    #[serde(default)]
    pub scrap_factor: Decimal,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub components: Vec<BomComponentInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBomInput {
    #[validate(length(min = 1, max = 20))]
    pub version: Option<String>,
    #[validate(range(min = 0))]
    pub production_time_minutes: Option<i32>,
    pub scrap_factor: Option<Decimal>,
    pub notes: Option<String>,
    /// Replaces the component list when present
    pub components: Option<Vec<BomComponentInput>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomComponentInput {
    pub component_item_id: i64,
    pub quantity: Decimal,
    pub unit_of_measure: Option<String>,
    pub sequence: Option<i32>,
    #[serde(default)]
    pub is_optional: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CopyBomInput {
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct BomWithComponents {
    #[serde(flatten)]
    pub bom: BillOfMaterials,
    pub components: Vec<BomComponent>,
}

/// Standard cost of one finished unit at current item costs
#[derive(Debug, Serialize)]
pub struct BomCost {
    pub bom_id: i64,
    pub finished_item_id: i64,
    pub components: Vec<BomCostLine>,
    pub standard_cost: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BomCostLine {
    pub component_item_id: i64,
    pub quantity: Decimal,
    pub item_cost: Decimal,
    pub line_cost: Decimal,
}

impl From<&BomComponent> for BomComponentInput {
    fn from(c: &BomComponent) -> Self {
        Self {
            component_item_id: c.component_item_id,
            quantity: c.quantity,
            unit_of_measure: c.unit_of_measure.clone(),
            sequence: Some(c.sequence),
            is_optional: c.is_optional,
            notes: c.notes.clone(),
        }
    }
}

fn validate_components(finished_item_id: i64, components: &[BomComponentInput]) -> AppResult<()> {
    for component in components {
        validate_positive_quantity(component.quantity)
            .map_err(|msg| AppError::validation("components.quantity", msg))?;
        if component.component_item_id == finished_item_id {
            return Err(AppError::validation(
                "components.component_item_id",
                "A BOM cannot list its own finished item",
            ));
        }
    }
    Ok(())
}

impl BomService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: CreateBomInput, actor: Option<i64>) -> AppResult<BomWithComponents> {
        input.validate()?;
        validate_scrap_factor(input.scrap_factor)
            .map_err(|msg| AppError::validation("scrap_factor", msg))?;
        validate_components(input.finished_item_id, &input.components)?;

        let mut tx = self.db.begin().await?;
        ledger::ensure_exists(&mut tx, "items", input.finished_item_id, "Item").await?;

        let bom_number = ledger::next_document_number(&mut tx, DocumentKind::Bom).await?;
        let sql = format!(
            r#"
            INSERT INTO boms (bom_number, finished_item_id, version, status, production_time_minutes,
                              scrap_factor, notes, created_by)
            VALUES ($1, $2, COALESCE($3, '1.0'), 'draft', $4, $5, $6, $7)
            RETURNING {BOM_COLUMNS}
            "#
        );
        let bom = sqlx::query_as::<_, BillOfMaterials>(&sql)
            .bind(&bom_number)
            .bind(input.finished_item_id)
            .bind(&input.version)
            .bind(input.production_time_minutes)
            .bind(input.scrap_factor)
            .bind(&input.notes)
            .bind(actor)
            .fetch_one(&mut *tx)
            .await?;

        let components = Self::insert_components(&mut tx, bom.id, &input.components).await?;
        tx.commit().await?;

        tracing::info!(bom_number = %bom.bom_number, components = components.len(), "BOM created");
        Ok(BomWithComponents { bom, components })
    }

    async fn insert_components(
        conn: &mut PgConnection,
        bom_id: i64,
        components: &[BomComponentInput],
    ) -> AppResult<Vec<BomComponent>> {
        let sql = format!(
            r#"
            INSERT INTO bom_components (bom_id, component_item_id, quantity, unit_of_measure,
                                        sequence, is_optional, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COMPONENT_COLUMNS}
            "#
        );

        let mut rows = Vec::with_capacity(components.len());
        for (index, component) in components.iter().enumerate() {
            ledger::ensure_exists(conn, "items", component.component_item_id, "Item").await?;
            let row = sqlx::query_as::<_, BomComponent>(&sql)
                .bind(bom_id)
                .bind(component.component_item_id)
                .bind(component.quantity)
                .bind(&component.unit_of_measure)
                .bind(component.sequence.unwrap_or(index as i32 + 1))
                .bind(component.is_optional)
                .bind(&component.notes)
                .fetch_one(&mut *conn)
                .await?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Edit a draft BOM
    pub async fn update(&self, bom_id: i64, input: UpdateBomInput) -> AppResult<BomWithComponents> {
        input.validate()?;
        if let Some(factor) = input.scrap_factor {
            validate_scrap_factor(factor).map_err(|msg| AppError::validation("scrap_factor", msg))?;
        }

        let mut tx = self.db.begin().await?;
        let bom = Self::fetch(&mut tx, bom_id, true).await?;
        if !bom.status.is_editable() {
            return Err(AppError::InvalidStateTransition(format!(
                "BOM {} is {} and can no longer be edited",
                bom.bom_number, bom.status
            )));
        }

        let sql = format!(
            r#"
            UPDATE boms SET
                version = COALESCE($2, version),
                production_time_minutes = COALESCE($3, production_time_minutes),
                scrap_factor = COALESCE($4, scrap_factor),
                notes = COALESCE($5, notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {BOM_COLUMNS}
            "#
        );
        let bom = sqlx::query_as::<_, BillOfMaterials>(&sql)
            .bind(bom_id)
            .bind(&input.version)
            .bind(input.production_time_minutes)
            .bind(input.scrap_factor)
            .bind(&input.notes)
            .fetch_one(&mut *tx)
            .await?;

        let components = match &input.components {
            Some(components) => {
                validate_components(bom.finished_item_id, components)?;
                if components.is_empty() {
                    return Err(AppError::validation("components", "A BOM needs at least one component"));
                }
                sqlx::query("DELETE FROM bom_components WHERE bom_id = $1")
                    .bind(bom_id)
                    .execute(&mut *tx)
                    .await?;
                Self::insert_components(&mut tx, bom_id, components).await?
            }
            None => Self::components(&mut tx, bom_id).await?,
        };

        tx.commit().await?;
        Ok(BomWithComponents { bom, components })
    }

    /// Make a BOM the active one for its item, retiring the previous one
    pub async fn activate(&self, bom_id: i64) -> AppResult<BillOfMaterials> {
        let mut tx = self.db.begin().await?;
        let bom = Self::fetch(&mut tx, bom_id, true).await?;
        let next = bom.status.transition(BomStatus::Active)?;

        let retired = sqlx::query(
            r#"
            UPDATE boms SET status = 'obsolete', updated_at = NOW()
            WHERE finished_item_id = $1 AND status = 'active' AND id <> $2
            "#,
        )
        .bind(bom.finished_item_id)
        .bind(bom_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let sql = format!(
            "UPDATE boms SET status = $2, activated_at = NOW(), updated_at = NOW() WHERE id = $1 RETURNING {BOM_COLUMNS}"
        );
        let activated = sqlx::query_as::<_, BillOfMaterials>(&sql)
            .bind(bom_id)
            .bind(next)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            bom_number = %activated.bom_number,
            finished_item_id = activated.finished_item_id,
            retired,
            "BOM activated"
        );
        Ok(activated)
    }

    pub async fn obsolete(&self, bom_id: i64) -> AppResult<BillOfMaterials> {
        let mut tx = self.db.begin().await?;
        let bom = Self::fetch(&mut tx, bom_id, true).await?;
        let next = bom.status.transition(BomStatus::Obsolete)?;

        let sql = format!(
            "UPDATE boms SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {BOM_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, BillOfMaterials>(&sql)
            .bind(bom_id)
            .bind(next)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Start a new draft version from an existing BOM
    pub async fn copy(&self, bom_id: i64, input: CopyBomInput, actor: Option<i64>) -> AppResult<BomWithComponents> {
        let source = self.get(bom_id).await?;
        let components: Vec<BomComponentInput> = source.components.iter().map(BomComponentInput::from).collect();

        self.create(
            CreateBomInput {
                finished_item_id: source.bom.finished_item_id,
                version: Some(input.version),
                production_time_minutes: source.bom.production_time_minutes,
                scrap_factor: source.bom.scrap_factor,
                notes: Some(format!("Copied from {}", source.bom.bom_number)),
                components,
            },
            actor,
        )
        .await
    }

    /// Delete a draft that was never used
    pub async fn delete(&self, bom_id: i64) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let bom = Self::fetch(&mut tx, bom_id, true).await?;
        if bom.status != BomStatus::Draft {
            return Err(AppError::InvalidStateTransition(format!(
                "only draft BOMs can be deleted, {} is {}",
                bom.bom_number, bom.status
            )));
        }

        let (used,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM production_orders WHERE bom_id = $1")
            .bind(bom_id)
            .fetch_one(&mut *tx)
            .await?;
        if used > 0 {
            return Err(AppError::Conflict {
                resource: "bom".to_string(),
                message: format!("BOM {} is referenced by {} production orders", bom.bom_number, used),
            });
        }

        sqlx::query("DELETE FROM boms WHERE id = $1")
            .bind(bom_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(bom_number = %bom.bom_number, "BOM deleted");
        Ok(())
    }

    pub(crate) async fn fetch(conn: &mut PgConnection, bom_id: i64, lock: bool) -> AppResult<BillOfMaterials> {
        let sql = format!(
            "SELECT {BOM_COLUMNS} FROM boms WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, BillOfMaterials>(&sql)
            .bind(bom_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("BOM {}", bom_id)))
    }

    pub(crate) async fn components(conn: &mut PgConnection, bom_id: i64) -> AppResult<Vec<BomComponent>> {
        let sql = format!("SELECT {COMPONENT_COLUMNS} FROM bom_components WHERE bom_id = $1 ORDER BY sequence, id");
        let rows = sqlx::query_as::<_, BomComponent>(&sql)
            .bind(bom_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows)
    }

    /// The active BOM for a finished item, if any
    pub(crate) async fn active_for_item(conn: &mut PgConnection, item_id: i64) -> AppResult<Option<BillOfMaterials>> {
        let sql = format!("SELECT {BOM_COLUMNS} FROM boms WHERE finished_item_id = $1 AND status = 'active'");
        let bom = sqlx::query_as::<_, BillOfMaterials>(&sql)
            .bind(item_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(bom)
    }

    pub async fn get(&self, bom_id: i64) -> AppResult<BomWithComponents> {
        let mut conn = self.db.acquire().await?;
        let bom = Self::fetch(&mut conn, bom_id, false).await?;
        let components = Self::components(&mut conn, bom_id).await?;
        Ok(BomWithComponents { bom, components })
    }

    pub async fn list(&self, finished_item_id: Option<i64>, status: Option<BomStatus>) -> AppResult<Vec<BillOfMaterials>> {
        let sql = format!(
            r#"
            SELECT {BOM_COLUMNS} FROM boms
            WHERE ($1::BIGINT IS NULL OR finished_item_id = $1)
              AND ($2::VARCHAR IS NULL OR status = $2)
            ORDER BY finished_item_id, id DESC
            "#
        );
        let boms = sqlx::query_as::<_, BillOfMaterials>(&sql)
            .bind(finished_item_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.db)
            .await?;
        Ok(boms)
    }

    pub async fn standard_cost(&self, bom_id: i64) -> AppResult<BomCost> {
        let mut conn = self.db.acquire().await?;
        let bom = Self::fetch(&mut conn, bom_id, false).await?;

        let rows = sqlx::query_as::<_, (i64, Decimal, Decimal)>(
            r#"
            SELECT c.component_item_id, c.quantity, i.unit_cost
            FROM bom_components c
            JOIN items i ON i.id = c.component_item_id
            WHERE c.bom_id = $1
            ORDER BY c.sequence, c.id
            "#,
        )
        .bind(bom_id)
        .fetch_all(&mut *conn)
        .await?;

        let pairs: Vec<(Decimal, Decimal)> = rows.iter().map(|(_, qty, cost)| (*qty, *cost)).collect();
        let components = rows
            .into_iter()
            .map(|(component_item_id, quantity, item_cost)| {
                Ok(BomCostLine {
                    component_item_id,
                    quantity,
                    item_cost,
                    line_cost: checked_product(quantity, item_cost, "component cost")?,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        Ok(BomCost {
            bom_id,
            finished_item_id: bom.finished_item_id,
            components,
            standard_cost: bom_standard_cost(&pairs)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_needs_at_least_one_component() {
        let mut input = CreateBomInput {
            finished_item_id: 1,
            version: Some("1.0".to_string()),
            production_time_minutes: Some(30),
            scrap_factor: Decimal::ZERO,
            notes: None,
            components: vec![],
        };
        assert!(input.validate().is_err());

        input.components.push(BomComponentInput {
            component_item_id: 2,
            quantity: Decimal::from(3),
            unit_of_measure: None,
            sequence: None,
            is_optional: false,
            notes: None,
        });
        assert!(input.validate().is_ok());
    }
}
