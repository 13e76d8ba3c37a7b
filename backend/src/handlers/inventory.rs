//! HTTP handlers for inventory queries

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{InventoryLevel, InventoryTransaction, StockFilter};
use crate::services::inventory::{
    ConsistencyReport, InventoryValuation, LowStockItem, TransactionQuery,
};
use crate::services::InventoryService;
use crate::AppState;
use shared::PaginatedResponse;

#[derive(Debug, Deserialize)]
pub struct ValuationQuery {
    pub location_id: Option<i64>,
}

fn inventory_service(state: &AppState) -> InventoryService {
    InventoryService::new(state.db.clone(), state.config.ledger.clone())
}

/// On-hand levels per item and location
pub async fn list_stock_levels(
    State(state): State<AppState>,
    Query(filter): Query<StockFilter>,
) -> AppResult<Json<Vec<InventoryLevel>>> {
    let levels = inventory_service(&state).stock_levels(filter).await?;
    Ok(Json(levels))
}

pub async fn list_inventory_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> AppResult<Json<PaginatedResponse<InventoryTransaction>>> {
    let transactions = inventory_service(&state).transactions(query).await?;
    Ok(Json(transactions))
}

/// Owned stock at batch cost
pub async fn get_inventory_valuation(
    State(state): State<AppState>,
    Query(query): Query<ValuationQuery>,
) -> AppResult<Json<InventoryValuation>> {
    let valuation = inventory_service(&state).valuation(query.location_id).await?;
    Ok(Json(valuation))
}

pub async fn list_low_stock(State(state): State<AppState>) -> AppResult<Json<Vec<LowStockItem>>> {
    let items = inventory_service(&state).low_stock().await?;
    Ok(Json(items))
}

/// Compare on-hand levels with the batch ledger
pub async fn check_inventory_consistency(
    State(state): State<AppState>,
    Query(filter): Query<StockFilter>,
) -> AppResult<Json<ConsistencyReport>> {
    let report = inventory_service(&state).consistency_check(filter).await?;
    Ok(Json(report))
}
