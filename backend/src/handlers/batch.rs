//! HTTP handlers for the batch ledger

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::Actor;
use crate::models::{Batch, BatchTransaction};
use crate::services::batch::{
    BatchFilter, BatchSummary, FifoAvailability, FifoPreview, FifoPreviewQuery, TransferBatchInput,
    TransferOutcome,
};
use crate::services::BatchService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchSummaryQuery {
    pub item_id: i64,
    pub location_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FifoQuery {
    pub item_id: i64,
    pub location_id: i64,
}

fn batch_service(state: &AppState) -> BatchService {
    BatchService::new(state.db.clone(), state.config.ledger.clone())
}

/// List batches
pub async fn list_batches(
    State(state): State<AppState>,
    Query(filter): Query<BatchFilter>,
) -> AppResult<Json<Vec<Batch>>> {
    let batches = batch_service(&state).list_batches(filter).await?;
    Ok(Json(batches))
}

pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<i64>,
) -> AppResult<Json<Batch>> {
    let batch = batch_service(&state).get_batch(batch_id).await?;
    Ok(Json(batch))
}

/// Movement history of a batch
pub async fn get_batch_transactions(
    State(state): State<AppState>,
    Path(batch_id): Path<i64>,
) -> AppResult<Json<Vec<BatchTransaction>>> {
    let transactions = batch_service(&state).batch_transactions(batch_id).await?;
    Ok(Json(transactions))
}

/// Move a batch, or part of it, to another location
pub async fn transfer_batch(
    State(state): State<AppState>,
    actor: Actor,
    Path(batch_id): Path<i64>,
    Json(input): Json<TransferBatchInput>,
) -> AppResult<Json<TransferOutcome>> {
    let outcome = batch_service(&state)
        .transfer(batch_id, input, actor.id())
        .await?;
    Ok(Json(outcome))
}

pub async fn quarantine_batch(
    State(state): State<AppState>,
    actor: Actor,
    Path(batch_id): Path<i64>,
) -> AppResult<Json<Batch>> {
    let batch = batch_service(&state)
        .set_quarantine(batch_id, true, actor.id())
        .await?;
    Ok(Json(batch))
}

pub async fn release_batch(
    State(state): State<AppState>,
    actor: Actor,
    Path(batch_id): Path<i64>,
) -> AppResult<Json<Batch>> {
    let batch = batch_service(&state)
        .set_quarantine(batch_id, false, actor.id())
        .await?;
    Ok(Json(batch))
}

/// Batch summary for an item
pub async fn get_batch_summary(
    State(state): State<AppState>,
    Query(query): Query<BatchSummaryQuery>,
) -> AppResult<Json<BatchSummary>> {
    let summary = batch_service(&state)
        .batch_summary(query.item_id, query.location_id)
        .await?;
    Ok(Json(summary))
}

/// Consumable batches in FIFO order
pub async fn get_available_fifo(
    State(state): State<AppState>,
    Query(query): Query<FifoQuery>,
) -> AppResult<Json<FifoAvailability>> {
    let available = batch_service(&state)
        .available_fifo(query.item_id, query.location_id)
        .await?;
    Ok(Json(available))
}

/// What a consumption would draw and cost
pub async fn preview_fifo(
    State(state): State<AppState>,
    Query(query): Query<FifoPreviewQuery>,
) -> AppResult<Json<FifoPreview>> {
    let preview = batch_service(&state).preview_fifo(query).await?;
    Ok(Json(preview))
}

/// Mark batches past their expiry date as expired
pub async fn expire_batches(State(state): State<AppState>) -> AppResult<Json<Vec<Batch>>> {
    let expired = batch_service(&state).expire_batches(Utc::now()).await?;
    Ok(Json(expired))
}
