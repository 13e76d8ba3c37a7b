//! HTTP handlers for purchase orders

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::StatusQuery;
use crate::error::AppResult;
use crate::middleware::Actor;
use crate::models::{PurchaseOrder, PurchaseOrderStatus};
use crate::services::purchase_order::{CreatePurchaseOrderInput, PurchaseOrderWithLines};
use crate::services::PurchaseOrderService;
use crate::AppState;

pub async fn create_purchase_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> AppResult<Json<PurchaseOrderWithLines>> {
    let service = PurchaseOrderService::new(state.db);
    let order = service.create(input, actor.id()).await?;
    Ok(Json(order))
}

pub async fn list_purchase_orders(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery<PurchaseOrderStatus>>,
) -> AppResult<Json<Vec<PurchaseOrder>>> {
    let service = PurchaseOrderService::new(state.db);
    let orders = service.list(query.status).await?;
    Ok(Json(orders))
}

pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(po_id): Path<i64>,
) -> AppResult<Json<PurchaseOrderWithLines>> {
    let service = PurchaseOrderService::new(state.db);
    let order = service.get(po_id).await?;
    Ok(Json(order))
}

pub async fn submit_purchase_order(
    State(state): State<AppState>,
    Path(po_id): Path<i64>,
) -> AppResult<Json<PurchaseOrder>> {
    let service = PurchaseOrderService::new(state.db);
    let order = service.submit(po_id).await?;
    Ok(Json(order))
}

pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    Path(po_id): Path<i64>,
) -> AppResult<Json<PurchaseOrder>> {
    let service = PurchaseOrderService::new(state.db);
    let order = service.cancel(po_id).await?;
    Ok(Json(order))
}
