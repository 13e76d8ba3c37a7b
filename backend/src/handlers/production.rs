//! HTTP handlers for production orders

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::StatusQuery;
use crate::error::AppResult;
use crate::middleware::Actor;
use crate::models::{ProductionConsumption, ProductionOrder, ProductionStatus};
use crate::services::production::{
    CompleteProductionInput, CompletionOutcome, CreateProductionOrderInput, ProductionOrderDetail,
    ProductionRequirements, RequirementsQuery, StartOutcome, Traceability,
};
use crate::services::ProductionService;
use crate::AppState;

fn production_service(state: &AppState) -> ProductionService {
    ProductionService::new(state.db.clone(), state.config.ledger.clone())
}

pub async fn create_production_order(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateProductionOrderInput>,
) -> AppResult<Json<ProductionOrderDetail>> {
    let order = production_service(&state).create(input, actor.id()).await?;
    Ok(Json(order))
}

pub async fn list_production_orders(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery<ProductionStatus>>,
) -> AppResult<Json<Vec<ProductionOrder>>> {
    let orders = production_service(&state).list(query.status).await?;
    Ok(Json(orders))
}

pub async fn get_production_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> AppResult<Json<ProductionOrderDetail>> {
    let order = production_service(&state).get(order_id).await?;
    Ok(Json(order))
}

pub async fn release_production_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> AppResult<Json<ProductionOrder>> {
    let order = production_service(&state).release(order_id).await?;
    Ok(Json(order))
}

pub async fn cancel_production_order(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> AppResult<Json<ProductionOrder>> {
    let order = production_service(&state).cancel(order_id).await?;
    Ok(Json(order))
}

/// Start production, drawing components by FIFO
pub async fn start_production(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<i64>,
) -> AppResult<Json<StartOutcome>> {
    let outcome = production_service(&state).start(order_id, actor.id()).await?;
    Ok(Json(outcome))
}

/// Report produced and scrapped output
pub async fn complete_production(
    State(state): State<AppState>,
    actor: Actor,
    Path(order_id): Path<i64>,
    Json(input): Json<CompleteProductionInput>,
) -> AppResult<Json<CompletionOutcome>> {
    let outcome = production_service(&state)
        .complete(order_id, input, actor.id())
        .await?;
    Ok(Json(outcome))
}

pub async fn get_production_requirements(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> AppResult<Json<ProductionRequirements>> {
    let requirements = production_service(&state).requirements(order_id).await?;
    Ok(Json(requirements))
}

/// Requirements for a planned run of a BOM
pub async fn plan_production(
    State(state): State<AppState>,
    Query(query): Query<RequirementsQuery>,
) -> AppResult<Json<ProductionRequirements>> {
    let requirements = production_service(&state).plan(query).await?;
    Ok(Json(requirements))
}

pub async fn get_production_traceability(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> AppResult<Json<Traceability>> {
    let trace = production_service(&state).traceability(order_id).await?;
    Ok(Json(trace))
}

pub async fn get_production_consumptions(
    State(state): State<AppState>,
    Path(order_id): Path<i64>,
) -> AppResult<Json<Vec<ProductionConsumption>>> {
    let rows = production_service(&state).consumptions(order_id).await?;
    Ok(Json(rows))
}
