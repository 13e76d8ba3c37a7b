//! Batch ledger tests against Postgres
//!
//! Each test gets a fresh database with the migrations applied. They need a
//! server reachable through `DATABASE_URL` and are run with
//! `cargo test -p inventory-erp-backend -- --ignored`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::str::FromStr;

use inventory_erp_backend::config::LedgerConfig;
use inventory_erp_backend::error::AppError;
use inventory_erp_backend::models::{
    Batch, BatchStatus, DocumentRef, ProductionStatus, ReceiptSource, ReferenceType, StockFilter,
};
use inventory_erp_backend::services::adjustment::CreateAdjustmentInput;
use inventory_erp_backend::services::batch::TransferBatchInput;
use inventory_erp_backend::services::production::{
    CompleteProductionInput, CreateProductionOrderInput, ManualComponentInput,
};
use inventory_erp_backend::services::purchase_order::{
    CreatePurchaseOrderInput, PurchaseOrderLineInput,
};
use inventory_erp_backend::services::receipt::{CreateReceiptInput, ReceiptLineInput};
use inventory_erp_backend::services::shipment::{CreateShipmentInput, ShipmentLineInput};
use inventory_erp_backend::services::{
    AdjustmentService, BatchService, InventoryService, ProductionService, PurchaseOrderService,
    ReceiptService, ShipmentService,
};
use shared::FifoOptions;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::days(n)
}

fn ledger() -> LedgerConfig {
    LedgerConfig {
        exclude_expired: true,
        currency: "EUR".to_string(),
    }
}

async fn item(pool: &PgPool, sku: &str, unit_cost: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO items (sku, name, unit_cost) VALUES ($1, $1, $2) RETURNING id")
        .bind(sku)
        .bind(dec(unit_cost))
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn location(pool: &PgPool, code: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO locations (code, name) VALUES ($1, $1) RETURNING id")
        .bind(code)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn line(item_id: i64, quantity: &str, unit_cost: &str) -> ReceiptLineInput {
    ReceiptLineInput {
        item_id,
        quantity: dec(quantity),
        scrap_quantity: Decimal::ZERO,
        unit_cost: Some(dec(unit_cost)),
        ownership_type: Default::default(),
        expiry_date: None,
        supplier_batch_number: None,
        bin_location: None,
        notes: None,
    }
}

/// Receive one manual line and return the batch it opened
async fn receive(pool: &PgPool, location_id: i64, received_at: DateTime<Utc>, line: ReceiptLineInput) -> Batch {
    let receipt = ReceiptService::new(pool.clone())
        .create(
            CreateReceiptInput {
                source_type: ReceiptSource::Manual,
                po_id: None,
                external_process_id: None,
                location_id,
                received_at: Some(received_at),
                notes: None,
                lines: vec![line],
            },
            None,
        )
        .await
        .unwrap();
    let batch_id = receipt.lines[0].batch_id.unwrap();
    BatchService::new(pool.clone(), ledger())
        .get_batch(batch_id)
        .await
        .unwrap()
}

async fn level(pool: &PgPool, item_id: i64, location_id: i64) -> Decimal {
    sqlx::query_scalar::<_, Decimal>(
        "SELECT COALESCE(SUM(quantity), 0) FROM inventory_levels WHERE item_id = $1 AND location_id = $2",
    )
    .bind(item_id)
    .bind(location_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn batch_remaining(pool: &PgPool, item_id: i64) -> Decimal {
    sqlx::query_scalar::<_, Decimal>(
        "SELECT COALESCE(SUM(quantity_available), 0) FROM batches WHERE item_id = $1",
    )
    .bind(item_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn assert_consistent(pool: &PgPool) {
    let report = InventoryService::new(pool.clone(), ledger())
        .consistency_check(StockFilter::default())
        .await
        .unwrap();
    assert!(report.consistent, "ledger drift: {:?}", report.discrepancies);
}

fn shipment(from_location_id: i64, lines: Vec<(i64, &str)>) -> CreateShipmentInput {
    CreateShipmentInput {
        from_location_id,
        customer_name: Some("Northwind".to_string()),
        shipping_address: None,
        tracking_number: None,
        notes: None,
        lines: lines
            .into_iter()
            .map(|(item_id, quantity)| ShipmentLineInput {
                item_id,
                quantity: dec(quantity),
                notes: None,
            })
            .collect(),
    }
}

fn production_order(finished: i64, component: i64, location_id: i64, quantity: &str) -> CreateProductionOrderInput {
    CreateProductionOrderInput {
        finished_item_id: finished,
        bom_id: None,
        location_id,
        quantity: dec(quantity),
        start_date: None,
        due_date: None,
        labor_cost: dec("60"),
        overhead_cost: dec("30"),
        notes: None,
        components: Some(vec![ManualComponentInput {
            item_id: component,
            quantity_per_unit: dec("2"),
            is_optional: false,
        }]),
    }
}

fn completion(good: &str, scrapped: &str) -> CompleteProductionInput {
    CompleteProductionInput {
        quantity_produced: dec(good),
        quantity_scrapped: dec(scrapped),
        scrap_reason: None,
    }
}

// ============================================================================
// Levels and batches agree
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn levels_follow_batches_through_every_document(pool: PgPool) {
    let sheet = item(&pool, "SHEET-1MM", "10").await;
    let widget = item(&pool, "WIDGET-100", "0").await;
    let main = location(&pool, "WH-MAIN").await;
    let overflow = location(&pool, "WH-OVER").await;

    let first = receive(&pool, main, day(1), line(sheet, "100", "10")).await;
    let second = receive(&pool, main, day(2), line(sheet, "50", "12")).await;
    assert_consistent(&pool).await;

    let shipped = ShipmentService::new(pool.clone(), ledger())
        .create(shipment(main, vec![(sheet, "30")]), None)
        .await
        .unwrap();
    assert_eq!(shipped.batches.len(), 1);
    assert_eq!(shipped.batches[0].batch_id, first.id);
    assert_eq!(shipped.total_cost, dec("300"));
    assert_consistent(&pool).await;

    BatchService::new(pool.clone(), ledger())
        .transfer(
            second.id,
            TransferBatchInput {
                to_location_id: overflow,
                to_bin_location: None,
                quantity: Some(dec("20")),
                notes: None,
            },
            None,
        )
        .await
        .unwrap();
    assert_consistent(&pool).await;

    let production = ProductionService::new(pool.clone(), ledger());
    let order = production
        .create(production_order(widget, sheet, main, "5"), None)
        .await
        .unwrap()
        .order;
    production.start(order.id, None).await.unwrap();
    production.complete(order.id, completion("5", "0"), None).await.unwrap();
    assert_consistent(&pool).await;

    assert_eq!(level(&pool, sheet, main).await, dec("100"));
    assert_eq!(level(&pool, sheet, overflow).await, dec("20"));
    assert_eq!(batch_remaining(&pool, sheet).await, dec("120"));
    assert_eq!(level(&pool, widget, main).await, dec("5"));
}

// ============================================================================
// Atomic documents
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn shipment_short_on_one_line_changes_nothing(pool: PgPool) {
    let bracket = item(&pool, "BRACKET-A", "2").await;
    let tube = item(&pool, "TUBE-20", "8").await;
    let main = location(&pool, "WH-MAIN").await;

    receive(&pool, main, day(1), line(bracket, "10", "2")).await;
    receive(&pool, main, day(1), line(tube, "5", "8")).await;

    let err = ShipmentService::new(pool.clone(), ledger())
        .create(shipment(main, vec![(bracket, "8"), (tube, "6")]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientInventory(_)), "{err:?}");

    assert_eq!(batch_remaining(&pool, bracket).await, dec("10"));
    assert_eq!(batch_remaining(&pool, tube).await, dec("5"));
    assert_eq!(level(&pool, bracket, main).await, dec("10"));
    assert_eq!(level(&pool, tube, main).await, dec("5"));

    let shipments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shipments")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(shipments, 0);
    assert_consistent(&pool).await;
}

// ============================================================================
// Transfers
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn partial_transfer_splits_the_batch(pool: PgPool) {
    let sheet = item(&pool, "SHEET-2MM", "10").await;
    let main = location(&pool, "WH-MAIN").await;
    let overflow = location(&pool, "WH-OVER").await;

    let mut received = line(sheet, "40", "10");
    received.bin_location = Some("A-01".to_string());
    let source = receive(&pool, main, day(1), received).await;

    let service = BatchService::new(pool.clone(), ledger());
    let move_part = |quantity: &str| TransferBatchInput {
        to_location_id: overflow,
        to_bin_location: Some("B-07".to_string()),
        quantity: Some(dec(quantity)),
        notes: None,
    };

    let outcome = service.transfer(source.id, move_part("15"), None).await.unwrap();
    let split = outcome.batch;
    let remainder = outcome.remainder.unwrap();

    assert_eq!(split.batch_number, format!("{}-S1", source.batch_number));
    assert_eq!(split.location_id, overflow);
    assert_eq!(split.quantity_available, dec("15"));
    assert_eq!(split.received_at, source.received_at);
    assert_eq!(split.unit_cost, source.unit_cost);
    assert_eq!(split.bin_location.as_deref(), Some("B-07"));
    assert_eq!(remainder.quantity_available, dec("25"));
    assert_eq!(remainder.bin_location.as_deref(), Some("A-01"));

    let again = service.transfer(source.id, move_part("5"), None).await.unwrap();
    assert_eq!(again.batch.batch_number, format!("{}-S2", source.batch_number));

    assert_eq!(level(&pool, sheet, main).await, dec("20"));
    assert_eq!(level(&pool, sheet, overflow).await, dec("20"));
    assert_consistent(&pool).await;
}

// ============================================================================
// Production costing
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn stepwise_completion_absorbs_the_order_cost(pool: PgPool) {
    let sheet = item(&pool, "SHEET-3MM", "10").await;
    let widget = item(&pool, "WIDGET-200", "0").await;
    let main = location(&pool, "WH-MAIN").await;
    receive(&pool, main, day(1), line(sheet, "30", "10")).await;

    let production = ProductionService::new(pool.clone(), ledger());
    let order = production
        .create(production_order(widget, sheet, main, "9"), None)
        .await
        .unwrap()
        .order;
    let started = production.start(order.id, None).await.unwrap();
    // 18 sheets at 10, plus 60 labor and 30 overhead
    assert_eq!(started.order.total_cost, dec("270"));

    let first = production.complete(order.id, completion("3", "0"), None).await.unwrap();
    assert_eq!(first.unit_cost, dec("30"));
    assert_eq!(first.order.status, ProductionStatus::InProgress);

    let last = production.complete(order.id, completion("4", "2"), None).await.unwrap();
    assert_eq!(last.unit_cost, dec("45"));
    assert_eq!(last.order.status, ProductionStatus::Completed);
    assert_eq!(last.order.cost_absorbed, last.order.total_cost);

    let booked: Decimal = [first.batch.unwrap(), last.batch.unwrap()]
        .iter()
        .map(|b| b.quantity_original * b.unit_cost)
        .sum();
    assert_eq!(booked, dec("270"));
    assert_consistent(&pool).await;
}

// ============================================================================
// Purchase order receipts
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn receipt_line_off_the_order_is_rejected(pool: PgPool) {
    let ordered = item(&pool, "BOLT-M8", "0.2").await;
    let other = item(&pool, "NUT-M8", "0.1").await;
    let main = location(&pool, "WH-MAIN").await;

    let purchasing = PurchaseOrderService::new(pool.clone());
    let order = purchasing
        .create(
            CreatePurchaseOrderInput {
                supplier_name: "Acme Fasteners".to_string(),
                expected_date: None,
                notes: None,
                lines: vec![PurchaseOrderLineInput {
                    item_id: ordered,
                    quantity: dec("1000"),
                    unit_price: dec("0.18"),
                }],
            },
            None,
        )
        .await
        .unwrap()
        .order;
    purchasing.submit(order.id).await.unwrap();

    let mut stray = line(other, "100", "0.1");
    stray.unit_cost = None;
    let err = ReceiptService::new(pool.clone())
        .create(
            CreateReceiptInput {
                source_type: ReceiptSource::PurchaseOrder,
                po_id: Some(order.id),
                external_process_id: None,
                location_id: main,
                received_at: None,
                notes: None,
                lines: vec![stray],
            },
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "lines.item_id"), "{err:?}");
    assert_eq!(batch_remaining(&pool, other).await, Decimal::ZERO);
}

// ============================================================================
// Adjustments
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn adjustments_keep_levels_and_batches_together(pool: PgPool) {
    let paint = item(&pool, "PAINT-RAL9005", "4.5").await;
    let main = location(&pool, "WH-MAIN").await;
    let oldest = receive(&pool, main, day(1), line(paint, "10", "4")).await;
    receive(&pool, main, day(2), line(paint, "10", "5")).await;

    let service = AdjustmentService::new(pool.clone(), ledger());
    let adjust = |change: &str| CreateAdjustmentInput {
        item_id: paint,
        location_id: main,
        quantity_change: dec(change),
        unit_cost: None,
        reason: "Cycle count".to_string(),
        bin_location: None,
        expiry_date: None,
        notes: None,
    };

    let gain = service.create(adjust("3"), None).await.unwrap();
    assert_eq!(gain.adjustment.adjustment_number, "ADJ-000001");
    assert_eq!(gain.adjustment.total_cost, dec("13.5"));
    let opened = BatchService::new(pool.clone(), ledger())
        .get_batch(gain.adjustment.batch_id.unwrap())
        .await
        .unwrap();
    assert_eq!(opened.unit_cost, dec("4.5"));
    assert_eq!(opened.quantity_available, dec("3"));

    let loss = service.create(adjust("-12"), None).await.unwrap();
    assert_eq!(loss.batches[0].batch_id, oldest.id);
    assert_eq!(loss.adjustment.total_cost, dec("-50"));
    assert!(loss.adjustment.batch_id.is_none());

    let err = service.create(adjust("-100"), None).await.unwrap_err();
    assert!(matches!(err, AppError::InsufficientInventory(_)), "{err:?}");

    assert_eq!(level(&pool, paint, main).await, dec("11"));
    assert_consistent(&pool).await;
}

// ============================================================================
// Expiry
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs a Postgres DATABASE_URL"]
async fn swept_batches_are_drawn_only_without_expiry_rule(pool: PgPool) {
    let resin = item(&pool, "RESIN-EP", "20").await;
    let main = location(&pool, "WH-MAIN").await;
    let mut received = line(resin, "8", "20");
    received.expiry_date = Some(day(5));
    let batch = receive(&pool, main, day(1), received).await;

    let expired = BatchService::new(pool.clone(), ledger())
        .expire_batches(day(6))
        .await
        .unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].status, BatchStatus::Expired);

    let reference = DocumentRef::new(ReferenceType::Scrap, 1);
    let mut tx = pool.begin().await.unwrap();
    let enforced = FifoOptions {
        now: day(7),
        exclude_expired: true,
    };
    let err = BatchService::consume_fifo(&mut tx, resin, main, dec("3"), reference, enforced, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientInventory(_)), "{err:?}");
    drop(tx);

    let mut tx = pool.begin().await.unwrap();
    let relaxed = FifoOptions {
        now: day(7),
        exclude_expired: false,
    };
    let drawn = BatchService::consume_fifo(&mut tx, resin, main, dec("3"), reference, relaxed, None)
        .await
        .unwrap();
    assert_eq!(drawn.len(), 1);
    assert_eq!(drawn[0].batch_id, batch.id);
    assert_eq!(drawn[0].total_cost, dec("60"));
}
