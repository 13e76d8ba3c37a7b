//! HTTP handlers for stock movements

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::error::AppResult;
use crate::middleware::Actor;
use crate::models::{StockFilter, StockMovement};
use crate::services::stock_movement::{CreateStockMovementInput, StockMovementWithBatches};
use crate::services::StockMovementService;
use crate::AppState;

/// Move stock between two locations
pub async fn create_stock_movement(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateStockMovementInput>,
) -> AppResult<Json<StockMovementWithBatches>> {
    let service = StockMovementService::new(state.db, state.config.ledger.clone());
    let movement = service.create(input, actor.id()).await?;
    Ok(Json(movement))
}

pub async fn list_stock_movements(
    State(state): State<AppState>,
    Query(filter): Query<StockFilter>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let service = StockMovementService::new(state.db, state.config.ledger.clone());
    let movements = service.list(filter).await?;
    Ok(Json(movements))
}

pub async fn get_stock_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<i64>,
) -> AppResult<Json<StockMovement>> {
    let service = StockMovementService::new(state.db, state.config.ledger.clone());
    let movement = service.get(movement_id).await?;
    Ok(Json(movement))
}
