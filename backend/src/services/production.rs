//! Production orders
//!
//! Starting an order draws every component from the order location by FIFO
//! and records which batches went in. Completing it books the finished goods
//! as a new batch valued at the rolled-up cost.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    Batch, BatchTransactionType, BomStatus, ComponentRequirement, DocumentRef,
    InventoryTransactionType, ProductionConsumption, ProductionOrder, ProductionStatus, Receipt,
    ReceiptSource, ReferenceType, Scrap, ScrapSource, StatusFlow,
};
use crate::services::batch::{consumed_cost, BatchService, ConsumedBatch, NewBatch, BATCH_COLUMNS};
use crate::services::bom::BomService;
use crate::services::ledger::{self, StockPosting};
use crate::services::receipt::{ReceiptHeader, ReceiptService};
use crate::services::scrap::{ScrapService, UnstockedScrap};
use shared::{
    checked_total, completion_cost, component_requirement, validate_completion, validate_positive_quantity,
    validate_unit_cost, DocumentKind, FifoOptions,
};

const ORDER_COLUMNS: &str = "id, order_number, finished_item_id, bom_id, location_id, quantity_ordered, \
     quantity_produced, quantity_scrapped, status, start_date, due_date, actual_start_date, \
     actual_completion_date, material_cost, labor_cost, overhead_cost, total_cost, cost_absorbed, \
     notes, created_by, created_at, updated_at";

const CONSUMPTION_COLUMNS: &str = "id, production_order_id, component_item_id, batch_id, quantity_consumed, \
     unit_cost, total_cost, consumed_at, consumed_by, notes";

#[derive(Clone)]
pub struct ProductionService {
    db: PgPool,
    ledger: LedgerConfig,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductionOrderInput {
    pub finished_item_id: i64,
    /// Defaults to the item's active BOM when no components are given
    pub bom_id: Option<i64>,
    pub location_id: i64,
    pub quantity: Decimal,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labor_cost: Decimal,
    #[serde(default)]
    pub overhead_cost: Decimal,
    pub notes: Option<String>,
    /// Manual component list for orders without a BOM
    pub components: Option<Vec<ManualComponentInput>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualComponentInput {
    pub item_id: i64,
    pub quantity_per_unit: Decimal,
    #[serde(default)]
    pub is_optional: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteProductionInput {
    pub quantity_produced: Decimal,
    #[serde(default)]
    pub quantity_scrapped: Decimal,
    #[validate(length(max = 500))]
    pub scrap_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RequirementsQuery {
    pub bom_id: i64,
    pub quantity: Decimal,
    pub location_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ProductionOrderDetail {
    #[serde(flatten)]
    pub order: ProductionOrder,
    pub components: Vec<ComponentRequirement>,
    pub remaining_quantity: Decimal,
    pub completion_percentage: Decimal,
}

/// What starting an order drew for one component
#[derive(Debug, Serialize)]
pub struct ComponentDraw {
    pub item_id: i64,
    pub required_quantity: Decimal,
    pub is_optional: bool,
    /// Optional component left out for lack of stock
    pub skipped: bool,
    pub batches: Vec<ConsumedBatch>,
    pub total_cost: Decimal,
}

#[derive(Debug, Serialize)]
pub struct StartOutcome {
    pub order: ProductionOrder,
    pub components: Vec<ComponentDraw>,
}

#[derive(Debug, Serialize)]
pub struct CompletionOutcome {
    pub order: ProductionOrder,
    pub receipt: Receipt,
    /// `None` when nothing good came out of this step
    pub batch: Option<Batch>,
    pub scrap: Option<Scrap>,
    pub unit_cost: Decimal,
}

#[derive(Debug, Serialize)]
pub struct RequirementRow {
    pub item_id: i64,
    pub sku: String,
    pub name: String,
    pub unit_of_measure: String,
    pub quantity_per_unit: Decimal,
    pub is_optional: bool,
    pub required_quantity: Decimal,
    pub available_quantity: Decimal,
    pub available_batches: i64,
    pub shortage: Decimal,
    pub is_sufficient: bool,
}

#[derive(Debug, Serialize)]
pub struct ProductionRequirements {
    pub finished_item_id: i64,
    pub location_id: i64,
    pub quantity: Decimal,
    pub requirements: Vec<RequirementRow>,
    /// Every mandatory component is covered
    pub all_components_available: bool,
}

#[derive(Debug, Serialize)]
pub struct TracedBatch {
    pub batch_id: i64,
    pub batch_number: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
    pub received_at: DateTime<Utc>,
    pub supplier_batch_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ComponentTrace {
    pub item_id: i64,
    pub sku: String,
    pub name: String,
    pub total_quantity: Decimal,
    pub total_cost: Decimal,
    pub batches: Vec<TracedBatch>,
}

#[derive(Debug, Serialize)]
pub struct Traceability {
    pub order: ProductionOrder,
    pub consumed_components: Vec<ComponentTrace>,
    pub finished_batches: Vec<Batch>,
    /// Total order cost over good output so far
    pub cost_per_unit: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct RequirementStock {
    sku: String,
    name: String,
    unit_of_measure: String,
    available: Decimal,
    batch_count: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ConsumptionTraceRow {
    component_item_id: i64,
    sku: String,
    name: String,
    batch_id: i64,
    batch_number: String,
    quantity_consumed: Decimal,
    unit_cost: Decimal,
    total_cost: Decimal,
    received_at: DateTime<Utc>,
    supplier_batch_number: Option<String>,
}

impl ProductionService {
    pub fn new(db: PgPool, ledger: LedgerConfig) -> Self {
        Self { db, ledger }
    }

    fn fifo_options(&self) -> FifoOptions {
        FifoOptions {
            now: Utc::now(),
            exclude_expired: self.ledger.exclude_expired,
        }
    }

    pub async fn create(
        &self,
        input: CreateProductionOrderInput,
        actor: Option<i64>,
    ) -> AppResult<ProductionOrderDetail> {
        input.validate()?;
        validate_positive_quantity(input.quantity)
            .map_err(|msg| AppError::validation("quantity", msg))?;
        validate_unit_cost(input.labor_cost).map_err(|msg| AppError::validation("labor_cost", msg))?;
        validate_unit_cost(input.overhead_cost)
            .map_err(|msg| AppError::validation("overhead_cost", msg))?;

        let mut tx = self.db.begin().await?;
        ledger::ensure_exists(&mut tx, "items", input.finished_item_id, "Item").await?;
        ledger::ensure_exists(&mut tx, "locations", input.location_id, "Location").await?;

        let manual = input.components.clone().unwrap_or_default();
        let bom_id = match (input.bom_id, manual.is_empty()) {
            (Some(bom_id), _) => {
                let bom = BomService::fetch(&mut tx, bom_id, false).await?;
                if bom.finished_item_id != input.finished_item_id {
                    return Err(AppError::validation("bom_id", "BOM belongs to a different item"));
                }
                if bom.status != BomStatus::Active {
                    return Err(AppError::validation("bom_id", "Only an active BOM can be used"));
                }
                Some(bom.id)
            }
            (None, true) => {
                let bom = BomService::active_for_item(&mut tx, input.finished_item_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::validation("components", "Item has no active BOM and no components were given")
                    })?;
                Some(bom.id)
            }
            (None, false) => None,
        };

        for component in &manual {
            validate_positive_quantity(component.quantity_per_unit)
                .map_err(|msg| AppError::validation("components.quantity_per_unit", msg))?;
        }

        let order_number = ledger::next_document_number(&mut tx, DocumentKind::ProductionOrder).await?;
        let sql = format!(
            r#"
            INSERT INTO production_orders (order_number, finished_item_id, bom_id, location_id,
                quantity_ordered, status, start_date, due_date, labor_cost, overhead_cost, total_cost,
                notes, created_by)
            VALUES ($1, $2, $3, $4, $5, 'draft', $6, $7, $8, $9, $8 + $9, $10, $11)
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let order = sqlx::query_as::<_, ProductionOrder>(&sql)
            .bind(&order_number)
            .bind(input.finished_item_id)
            .bind(bom_id)
            .bind(input.location_id)
            .bind(input.quantity)
            .bind(input.start_date)
            .bind(input.due_date)
            .bind(input.labor_cost)
            .bind(input.overhead_cost)
            .bind(&input.notes)
            .bind(actor)
            .fetch_one(&mut *tx)
            .await?;

        if bom_id.is_none() {
            for component in &manual {
                ledger::ensure_exists(&mut tx, "items", component.item_id, "Item").await?;
                sqlx::query(
                    r#"
                    INSERT INTO production_order_components (production_order_id, item_id, quantity_per_unit, is_optional)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(order.id)
                .bind(component.item_id)
                .bind(component.quantity_per_unit)
                .bind(component.is_optional)
                .execute(&mut *tx)
                .await?;
            }
        }

        let components = Self::order_components(&mut tx, &order).await?;
        tx.commit().await?;

        tracing::info!(
            order_number = %order.order_number,
            finished_item_id = order.finished_item_id,
            quantity = %order.quantity_ordered,
            bom_id = ?order.bom_id,
            "production order created"
        );
        Ok(Self::detail(order, components))
    }

    fn detail(order: ProductionOrder, components: Vec<ComponentRequirement>) -> ProductionOrderDetail {
        ProductionOrderDetail {
            remaining_quantity: order.remaining_quantity(),
            completion_percentage: order.completion_percentage(),
            order,
            components,
        }
    }

    async fn fetch(conn: &mut PgConnection, order_id: i64, lock: bool) -> AppResult<ProductionOrder> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM production_orders WHERE id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );
        sqlx::query_as::<_, ProductionOrder>(&sql)
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Production order {}", order_id)))
    }

    /// Component list of an order, from its BOM or its manual list
    async fn order_components(
        conn: &mut PgConnection,
        order: &ProductionOrder,
    ) -> AppResult<Vec<ComponentRequirement>> {
        if let Some(bom_id) = order.bom_id {
            let components = BomService::components(conn, bom_id).await?;
            return Ok(components.iter().map(ComponentRequirement::from).collect());
        }

        let components = sqlx::query_as::<_, ComponentRequirement>(
            r#"
            SELECT item_id, quantity_per_unit, is_optional
            FROM production_order_components
            WHERE production_order_id = $1
            ORDER BY id
            "#,
        )
        .bind(order.id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(components)
    }

    async fn set_status(
        conn: &mut PgConnection,
        order_id: i64,
        status: ProductionStatus,
    ) -> AppResult<ProductionOrder> {
        let sql = format!(
            "UPDATE production_orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        let order = sqlx::query_as::<_, ProductionOrder>(&sql)
            .bind(order_id)
            .bind(status)
            .fetch_one(&mut *conn)
            .await?;
        Ok(order)
    }

    pub async fn release(&self, order_id: i64) -> AppResult<ProductionOrder> {
        self.change_status(order_id, ProductionStatus::Released).await
    }

    pub async fn cancel(&self, order_id: i64) -> AppResult<ProductionOrder> {
        self.change_status(order_id, ProductionStatus::Cancelled).await
    }

    async fn change_status(&self, order_id: i64, next: ProductionStatus) -> AppResult<ProductionOrder> {
        let mut tx = self.db.begin().await?;
        let order = Self::fetch(&mut tx, order_id, true).await?;
        let next = order.status.transition(next)?;
        let updated = Self::set_status(&mut tx, order_id, next).await?;
        tx.commit().await?;

        tracing::info!(order_number = %updated.order_number, status = %updated.status, "production order status changed");
        Ok(updated)
    }

    /// Start production: every component is drawn from the order location
    /// oldest batch first. Optional components that are short are skipped;
    /// any other shortage aborts the start.
    pub async fn start(&self, order_id: i64, actor: Option<i64>) -> AppResult<StartOutcome> {
        let mut tx = self.db.begin().await?;
        let order = Self::fetch(&mut tx, order_id, true).await?;
        let next = order.status.transition(ProductionStatus::InProgress)?;

        if let Some(bom_id) = order.bom_id {
            let bom = BomService::fetch(&mut tx, bom_id, false).await?;
            if bom.status != BomStatus::Active {
                return Err(AppError::InvalidStateTransition(format!(
                    "BOM {} is {}, production needs an active BOM",
                    bom.bom_number, bom.status
                )));
            }
        }

        let components = Self::order_components(&mut tx, &order).await?;
        if components.is_empty() {
            return Err(AppError::validation("components", "Production order has no components"));
        }

        let reference = DocumentRef::new(ReferenceType::ProductionOrder, order.id);
        let options = self.fifo_options();
        let mut draws = Vec::with_capacity(components.len());

        for component in &components {
            let required = component_requirement(component.quantity_per_unit, order.quantity_ordered)?;
            if required <= Decimal::ZERO {
                continue;
            }

            let consumed = match BatchService::consume_fifo(
                &mut tx,
                component.item_id,
                order.location_id,
                required,
                reference,
                options,
                actor,
            )
            .await
            {
                Ok(consumed) => consumed,
                Err(AppError::InsufficientInventory(message)) if component.is_optional => {
                    tracing::warn!(
                        order_number = %order.order_number,
                        item_id = component.item_id,
                        %message,
                        "optional component skipped"
                    );
                    draws.push(ComponentDraw {
                        item_id: component.item_id,
                        required_quantity: required,
                        is_optional: true,
                        skipped: true,
                        batches: Vec::new(),
                        total_cost: Decimal::ZERO,
                    });
                    continue;
                }
                Err(err) => return Err(err),
            };

            for batch in &consumed {
                sqlx::query(
                    r#"
                    INSERT INTO production_consumptions (production_order_id, component_item_id, batch_id,
                        quantity_consumed, unit_cost, total_cost, consumed_by, notes)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(order.id)
                .bind(component.item_id)
                .bind(batch.batch_id)
                .bind(batch.quantity)
                .bind(batch.unit_cost)
                .bind(batch.total_cost)
                .bind(actor)
                .bind(format!("Batch {} consumed", batch.batch_number))
                .execute(&mut *tx)
                .await?;
            }

            ledger::post_stock(
                &mut tx,
                StockPosting {
                    item_id: component.item_id,
                    location_id: order.location_id,
                    transaction_type: InventoryTransactionType::ProductionOut,
                    quantity: -required,
                    reference: Some(reference),
                    notes: Some(format!("Production order {}", order.order_number)),
                },
                actor,
            )
            .await?;

            draws.push(ComponentDraw {
                item_id: component.item_id,
                required_quantity: required,
                is_optional: component.is_optional,
                skipped: false,
                total_cost: consumed_cost(&consumed)?,
                batches: consumed,
            });
        }

        let material_cost = checked_total(draws.iter().map(|d| d.total_cost), "material cost")?;
        let mut cost = order.production_cost();
        cost.material_cost = material_cost;
        let total_cost = cost.total()?;

        let sql = format!(
            r#"
            UPDATE production_orders
            SET status = $2, actual_start_date = NOW(), material_cost = $3, total_cost = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let started = sqlx::query_as::<_, ProductionOrder>(&sql)
            .bind(order.id)
            .bind(next)
            .bind(material_cost)
            .bind(total_cost)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            order_number = %started.order_number,
            components = draws.len(),
            material_cost = %started.material_cost,
            total_cost = %started.total_cost,
            "production started"
        );

        Ok(StartOutcome {
            order: started,
            components: draws,
        })
    }

    /// Report good and scrapped output. Good units become a finished-goods
    /// batch at the order location; the order closes once everything ordered
    /// is accounted for.
    pub async fn complete(
        &self,
        order_id: i64,
        input: CompleteProductionInput,
        actor: Option<i64>,
    ) -> AppResult<CompletionOutcome> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        let order = Self::fetch(&mut tx, order_id, true).await?;
        if order.status != ProductionStatus::InProgress {
            return Err(AppError::InvalidStateTransition(format!(
                "production order {} is {}, only started orders can be completed",
                order.order_number, order.status
            )));
        }

        let good = input.quantity_produced;
        let scrapped = input.quantity_scrapped;
        validate_completion(good, scrapped, order.remaining_quantity())
            .map_err(|msg| AppError::validation("quantity_produced", msg))?;

        let closes_order =
            order.quantity_produced + order.quantity_scrapped + good + scrapped >= order.quantity_ordered;
        let cost = completion_cost(
            order.total_cost,
            order.cost_absorbed,
            order.quantity_ordered,
            good,
            closes_order,
        )?;

        let receipt = ReceiptService::insert_header(
            &mut tx,
            ReceiptHeader {
                source_type: ReceiptSource::Production,
                po_id: None,
                external_process_id: None,
                production_order_number: Some(order.order_number.clone()),
                location_id: order.location_id,
                received_at: None,
                notes: Some(format!("Production completed for {}", order.order_number)),
            },
            actor,
        )
        .await?;

        let reference = DocumentRef::new(ReferenceType::ProductionOrder, order.id);
        let batch = if good > Decimal::ZERO {
            let batch = BatchService::create_batch(
                &mut tx,
                NewBatch {
                    receipt_id: Some(receipt.id),
                    production_order_number: Some(order.order_number.clone()),
                    notes: Some(format!(
                        "Produced from {}. Material cost: {}",
                        order.order_number,
                        order.material_cost.round_dp(2)
                    )),
                    transaction_type: BatchTransactionType::Production,
                    reference: Some(reference),
                    ..NewBatch::received(order.finished_item_id, order.location_id, good, cost.unit_cost)
                },
                actor,
            )
            .await?;

            ledger::post_stock(
                &mut tx,
                StockPosting {
                    item_id: order.finished_item_id,
                    location_id: order.location_id,
                    transaction_type: InventoryTransactionType::ProductionIn,
                    quantity: good,
                    reference: Some(reference),
                    notes: Some(format!("Production completed: {}", order.order_number)),
                },
                actor,
            )
            .await?;
            Some(batch)
        } else {
            None
        };

        ReceiptService::insert_line(
            &mut tx,
            receipt.id,
            order.finished_item_id,
            good + scrapped,
            scrapped,
            batch.as_ref().map(|b| b.id),
            None,
        )
        .await?;

        let scrap = if scrapped > Decimal::ZERO {
            let scrap = ScrapService::record_unstocked(
                &mut tx,
                UnstockedScrap {
                    item_id: order.finished_item_id,
                    location_id: order.location_id,
                    quantity: scrapped,
                    total_cost: Decimal::ZERO,
                    reason: input
                        .scrap_reason
                        .clone()
                        .unwrap_or_else(|| "Production scrap".to_string()),
                    source_type: ScrapSource::Production,
                    source_id: Some(order.id),
                    notes: Some(format!("Scrapped during production {}", order.order_number)),
                },
                actor,
            )
            .await?;
            Some(scrap)
        } else {
            None
        };

        let status = if closes_order {
            order.status.transition(ProductionStatus::Completed)?
        } else {
            order.status
        };
        let sql = format!(
            r#"
            UPDATE production_orders
            SET quantity_produced = quantity_produced + $2,
                quantity_scrapped = quantity_scrapped + $3,
                cost_absorbed = $4,
                status = $5,
                actual_completion_date = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let updated = sqlx::query_as::<_, ProductionOrder>(&sql)
            .bind(order.id)
            .bind(good)
            .bind(scrapped)
            .bind(cost.absorbed_after)
            .bind(status)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            order_number = %updated.order_number,
            produced = %good,
            scrapped = %scrapped,
            unit_cost = %cost.unit_cost,
            closed = closes_order,
            "production completed"
        );

        Ok(CompletionOutcome {
            order: updated,
            receipt,
            batch,
            scrap,
            unit_cost: cost.unit_cost,
        })
    }

    /// Required against available stock for each component of an order
    pub async fn requirements(&self, order_id: i64) -> AppResult<ProductionRequirements> {
        let mut conn = self.db.acquire().await?;
        let order = Self::fetch(&mut conn, order_id, false).await?;
        let components = Self::order_components(&mut conn, &order).await?;
        self.requirement_report(
            &mut conn,
            order.finished_item_id,
            &components,
            order.quantity_ordered,
            order.location_id,
        )
        .await
    }

    /// Requirements of a planned run of a BOM
    pub async fn plan(&self, query: RequirementsQuery) -> AppResult<ProductionRequirements> {
        validate_positive_quantity(query.quantity)
            .map_err(|msg| AppError::validation("quantity", msg))?;
        let mut conn = self.db.acquire().await?;
        let bom = BomService::fetch(&mut conn, query.bom_id, false).await?;
        let components: Vec<ComponentRequirement> = BomService::components(&mut conn, bom.id)
            .await?
            .iter()
            .map(ComponentRequirement::from)
            .collect();
        self.requirement_report(
            &mut conn,
            bom.finished_item_id,
            &components,
            query.quantity,
            query.location_id,
        )
        .await
    }

    async fn requirement_report(
        &self,
        conn: &mut PgConnection,
        finished_item_id: i64,
        components: &[ComponentRequirement],
        quantity: Decimal,
        location_id: i64,
    ) -> AppResult<ProductionRequirements> {
        let now = Utc::now();
        let mut requirements = Vec::with_capacity(components.len());

        for component in components {
            let stock = sqlx::query_as::<_, RequirementStock>(
                r#"
                SELECT i.sku, i.name, i.unit_of_measure,
                       COALESCE(SUM(b.quantity_available), 0) AS available,
                       COUNT(b.id) AS batch_count
                FROM items i
                LEFT JOIN batches b
                  ON b.item_id = i.id AND b.location_id = $2
                 AND (b.status = 'active' OR (NOT $3 AND b.status = 'expired'))
                 AND b.quantity_available > 0
                 AND (NOT $3 OR b.expiry_date IS NULL OR b.expiry_date > $4)
                WHERE i.id = $1
                GROUP BY i.id
                "#,
            )
            .bind(component.item_id)
            .bind(location_id)
            .bind(self.ledger.exclude_expired)
            .bind(now)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {}", component.item_id)))?;

            let required = component_requirement(component.quantity_per_unit, quantity)?;
            requirements.push(RequirementRow {
                item_id: component.item_id,
                sku: stock.sku,
                name: stock.name,
                unit_of_measure: stock.unit_of_measure,
                quantity_per_unit: component.quantity_per_unit,
                is_optional: component.is_optional,
                required_quantity: required,
                available_quantity: stock.available,
                available_batches: stock.batch_count,
                shortage: (required - stock.available).max(Decimal::ZERO),
                is_sufficient: stock.available >= required,
            });
        }

        let all_components_available = requirements
            .iter()
            .all(|r| r.is_sufficient || r.is_optional);

        Ok(ProductionRequirements {
            finished_item_id,
            location_id,
            quantity,
            requirements,
            all_components_available,
        })
    }

    /// Consumed batches by component and the finished batches of an order
    pub async fn traceability(&self, order_id: i64) -> AppResult<Traceability> {
        let mut conn = self.db.acquire().await?;
        let order = Self::fetch(&mut conn, order_id, false).await?;

        let rows = sqlx::query_as::<_, ConsumptionTraceRow>(
            r#"
            SELECT pc.component_item_id, i.sku, i.name, pc.batch_id, b.batch_number,
                   pc.quantity_consumed, pc.unit_cost, pc.total_cost, b.received_at,
                   b.supplier_batch_number
            FROM production_consumptions pc
            JOIN items i ON i.id = pc.component_item_id
            JOIN batches b ON b.id = pc.batch_id
            WHERE pc.production_order_id = $1
            ORDER BY pc.id
            "#,
        )
        .bind(order.id)
        .fetch_all(&mut *conn)
        .await?;

        let mut by_component: BTreeMap<i64, ComponentTrace> = BTreeMap::new();
        for row in rows {
            let trace = by_component
                .entry(row.component_item_id)
                .or_insert_with(|| ComponentTrace {
                    item_id: row.component_item_id,
                    sku: row.sku.clone(),
                    name: row.name.clone(),
                    total_quantity: Decimal::ZERO,
                    total_cost: Decimal::ZERO,
                    batches: Vec::new(),
                });
            trace.total_quantity =
                checked_total([trace.total_quantity, row.quantity_consumed], "consumed quantity")?;
            trace.total_cost = checked_total([trace.total_cost, row.total_cost], "consumed cost")?;
            trace.batches.push(TracedBatch {
                batch_id: row.batch_id,
                batch_number: row.batch_number,
                quantity: row.quantity_consumed,
                unit_cost: row.unit_cost,
                total_cost: row.total_cost,
                received_at: row.received_at,
                supplier_batch_number: row.supplier_batch_number,
            });
        }

        let sql = format!(
            r#"
            SELECT {BATCH_COLUMNS} FROM batches
            WHERE item_id = $1 AND production_order_number = $2
            ORDER BY received_at, id
            "#
        );
        let finished_batches = sqlx::query_as::<_, Batch>(&sql)
            .bind(order.finished_item_id)
            .bind(&order.order_number)
            .fetch_all(&mut *conn)
            .await?;

        let cost_per_unit = shared::unit_cost(order.total_cost, order.quantity_produced)?;

        Ok(Traceability {
            order,
            consumed_components: by_component.into_values().collect(),
            finished_batches,
            cost_per_unit,
        })
    }

    /// Raw consumption rows of an order
    pub async fn consumptions(&self, order_id: i64) -> AppResult<Vec<ProductionConsumption>> {
        let sql = format!(
            "SELECT {CONSUMPTION_COLUMNS} FROM production_consumptions WHERE production_order_id = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, ProductionConsumption>(&sql)
            .bind(order_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    pub async fn get(&self, order_id: i64) -> AppResult<ProductionOrderDetail> {
        let mut conn = self.db.acquire().await?;
        let order = Self::fetch(&mut conn, order_id, false).await?;
        let components = Self::order_components(&mut conn, &order).await?;
        Ok(Self::detail(order, components))
    }

    pub async fn list(&self, status: Option<ProductionStatus>) -> AppResult<Vec<ProductionOrder>> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM production_orders
            WHERE ($1::VARCHAR IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            "#
        );
        let orders = sqlx::query_as::<_, ProductionOrder>(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.db)
            .await?;
        Ok(orders)
    }
}
