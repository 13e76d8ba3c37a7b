//! HTTP handlers for scrap documents

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::error::AppResult;
use crate::middleware::Actor;
use crate::models::{Scrap, StockFilter};
use crate::services::scrap::{CreateScrapInput, ScrapWithBatches};
use crate::services::ScrapService;
use crate::AppState;

/// Scrap stock from a location
pub async fn create_scrap(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateScrapInput>,
) -> AppResult<Json<ScrapWithBatches>> {
    let service = ScrapService::new(state.db, state.config.ledger.clone());
    let scrap = service.create(input, actor.id()).await?;
    Ok(Json(scrap))
}

pub async fn list_scraps(
    State(state): State<AppState>,
    Query(filter): Query<StockFilter>,
) -> AppResult<Json<Vec<Scrap>>> {
    let service = ScrapService::new(state.db, state.config.ledger.clone());
    let scraps = service.list(filter).await?;
    Ok(Json(scraps))
}

pub async fn get_scrap(
    State(state): State<AppState>,
    Path(scrap_id): Path<i64>,
) -> AppResult<Json<ScrapWithBatches>> {
    let service = ScrapService::new(state.db, state.config.ledger.clone());
    let scrap = service.get(scrap_id).await?;
    Ok(Json(scrap))
}
