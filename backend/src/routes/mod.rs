//! Route definitions for the Inventory ERP API

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/items", item_routes())
        .nest("/locations", location_routes())
        .nest("/batches", batch_routes())
        .nest("/purchase-orders", purchase_order_routes())
        .nest("/receipts", receipt_routes())
        .nest("/shipments", shipment_routes())
        .nest("/scraps", scrap_routes())
        .nest("/adjustments", adjustment_routes())
        .nest("/external-processes", external_process_routes())
        .nest("/stock-movements", stock_movement_routes())
        .nest("/boms", bom_routes())
        .nest("/production-orders", production_routes())
        .nest("/inventory", inventory_routes())
}

/// Item master data
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route("/:item_id", get(handlers::get_item).put(handlers::update_item))
        .route("/:item_id/stock", get(handlers::get_item_stock))
}

fn location_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_locations).post(handlers::create_location))
        .route("/:location_id", get(handlers::get_location))
        .route("/:location_id/capacity", get(handlers::get_location_capacity))
}

/// Batch ledger
fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches))
        .route("/summary", get(handlers::get_batch_summary))
        .route("/fifo", get(handlers::get_available_fifo))
        .route("/fifo/preview", get(handlers::preview_fifo))
        .route("/expire", post(handlers::expire_batches))
        .route("/:batch_id", get(handlers::get_batch))
        .route("/:batch_id/transactions", get(handlers::get_batch_transactions))
        .route("/:batch_id/transfer", post(handlers::transfer_batch))
        .route("/:batch_id/quarantine", post(handlers::quarantine_batch))
        .route("/:batch_id/release", post(handlers::release_batch))
}

fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchase_orders).post(handlers::create_purchase_order),
        )
        .route("/:po_id", get(handlers::get_purchase_order))
        .route("/:po_id/submit", post(handlers::submit_purchase_order))
        .route("/:po_id/cancel", post(handlers::cancel_purchase_order))
}

fn receipt_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_receipts).post(handlers::create_receipt))
        .route("/:receipt_id", get(handlers::get_receipt))
}

fn shipment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_shipments).post(handlers::create_shipment))
        .route("/:shipment_id", get(handlers::get_shipment))
        .route("/:shipment_id/ship", post(handlers::ship_shipment))
        .route("/:shipment_id/deliver", post(handlers::deliver_shipment))
        .route("/:shipment_id/cancel", post(handlers::cancel_shipment))
}

fn scrap_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_scraps).post(handlers::create_scrap))
        .route("/:scrap_id", get(handlers::get_scrap))
}

fn adjustment_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_adjustments).post(handlers::create_adjustment))
        .route("/:adjustment_id", get(handlers::get_adjustment))
}

fn external_process_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_external_processes).post(handlers::send_external_process),
        )
        .route(
            "/:process_id",
            get(handlers::get_external_process).put(handlers::update_external_process),
        )
}

fn stock_movement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_stock_movements).post(handlers::create_stock_movement),
        )
        .route("/:movement_id", get(handlers::get_stock_movement))
}

/// Bills of materials
fn bom_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_boms).post(handlers::create_bom))
        .route(
            "/:bom_id",
            get(handlers::get_bom)
                .put(handlers::update_bom)
                .delete(handlers::delete_bom),
        )
        .route("/:bom_id/activate", post(handlers::activate_bom))
        .route("/:bom_id/obsolete", post(handlers::obsolete_bom))
        .route("/:bom_id/copy", post(handlers::copy_bom))
        .route("/:bom_id/cost", get(handlers::get_bom_cost))
}

/// Production orders
fn production_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_production_orders).post(handlers::create_production_order),
        )
        .route("/plan", get(handlers::plan_production))
        .route("/:order_id", get(handlers::get_production_order))
        .route("/:order_id/release", post(handlers::release_production_order))
        .route("/:order_id/start", post(handlers::start_production))
        .route("/:order_id/complete", post(handlers::complete_production))
        .route("/:order_id/cancel", post(handlers::cancel_production_order))
        .route("/:order_id/requirements", get(handlers::get_production_requirements))
        .route("/:order_id/traceability", get(handlers::get_production_traceability))
        .route("/:order_id/consumptions", get(handlers::get_production_consumptions))
}

/// Inventory queries
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/stock", get(handlers::list_stock_levels))
        .route("/transactions", get(handlers::list_inventory_transactions))
        .route("/valuation", get(handlers::get_inventory_valuation))
        .route("/low-stock", get(handlers::list_low_stock))
        .route("/consistency", get(handlers::check_inventory_consistency))
}
