//! HTTP handlers for goods receipts

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::Actor;
use crate::models::{Receipt, ReceiptSource};
use crate::services::receipt::{CreateReceiptInput, ReceiptWithLines};
use crate::services::ReceiptService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReceiptListQuery {
    pub source_type: Option<ReceiptSource>,
}

/// Post a receipt: one batch per line, receipt scrap kept out of stock
pub async fn create_receipt(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateReceiptInput>,
) -> AppResult<Json<ReceiptWithLines>> {
    let service = ReceiptService::new(state.db);
    let receipt = service.create(input, actor.id()).await?;
    Ok(Json(receipt))
}

pub async fn list_receipts(
    State(state): State<AppState>,
    Query(query): Query<ReceiptListQuery>,
) -> AppResult<Json<Vec<Receipt>>> {
    let service = ReceiptService::new(state.db);
    let receipts = service.list(query.source_type).await?;
    Ok(Json(receipts))
}

pub async fn get_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<i64>,
) -> AppResult<Json<ReceiptWithLines>> {
    let service = ReceiptService::new(state.db);
    let receipt = service.get(receipt_id).await?;
    Ok(Json(receipt))
}
