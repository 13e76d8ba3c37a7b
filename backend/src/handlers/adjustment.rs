//! HTTP handlers for stock adjustments

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::error::AppResult;
use crate::middleware::Actor;
use crate::models::{StockAdjustment, StockFilter};
use crate::services::adjustment::{AdjustmentWithBatches, CreateAdjustmentInput};
use crate::services::AdjustmentService;
use crate::AppState;

/// Correct the stock of an item at a location
pub async fn create_adjustment(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateAdjustmentInput>,
) -> AppResult<Json<AdjustmentWithBatches>> {
    let service = AdjustmentService::new(state.db, state.config.ledger.clone());
    let adjustment = service.create(input, actor.id()).await?;
    Ok(Json(adjustment))
}

pub async fn list_adjustments(
    State(state): State<AppState>,
    Query(filter): Query<StockFilter>,
) -> AppResult<Json<Vec<StockAdjustment>>> {
    let service = AdjustmentService::new(state.db, state.config.ledger.clone());
    let adjustments = service.list(filter).await?;
    Ok(Json(adjustments))
}

pub async fn get_adjustment(
    State(state): State<AppState>,
    Path(adjustment_id): Path<i64>,
) -> AppResult<Json<AdjustmentWithBatches>> {
    let service = AdjustmentService::new(state.db, state.config.ledger.clone());
    let adjustment = service.get(adjustment_id).await?;
    Ok(Json(adjustment))
}
