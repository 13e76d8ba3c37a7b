//! HTTP handlers for bills of materials

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::Actor;
use crate::models::{BillOfMaterials, BomStatus};
use crate::services::bom::{BomCost, BomWithComponents, CopyBomInput, CreateBomInput, UpdateBomInput};
use crate::services::BomService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BomListQuery {
    pub finished_item_id: Option<i64>,
    pub status: Option<BomStatus>,
}

pub async fn create_bom(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateBomInput>,
) -> AppResult<Json<BomWithComponents>> {
    let service = BomService::new(state.db);
    let bom = service.create(input, actor.id()).await?;
    Ok(Json(bom))
}

pub async fn list_boms(
    State(state): State<AppState>,
    Query(query): Query<BomListQuery>,
) -> AppResult<Json<Vec<BillOfMaterials>>> {
    let service = BomService::new(state.db);
    let boms = service.list(query.finished_item_id, query.status).await?;
    Ok(Json(boms))
}

pub async fn get_bom(
    State(state): State<AppState>,
    Path(bom_id): Path<i64>,
) -> AppResult<Json<BomWithComponents>> {
    let service = BomService::new(state.db);
    let bom = service.get(bom_id).await?;
    Ok(Json(bom))
}

/// Edit a draft BOM
pub async fn update_bom(
    State(state): State<AppState>,
    Path(bom_id): Path<i64>,
    Json(input): Json<UpdateBomInput>,
) -> AppResult<Json<BomWithComponents>> {
    let service = BomService::new(state.db);
    let bom = service.update(bom_id, input).await?;
    Ok(Json(bom))
}

pub async fn delete_bom(
    State(state): State<AppState>,
    Path(bom_id): Path<i64>,
) -> AppResult<StatusCode> {
    let service = BomService::new(state.db);
    service.delete(bom_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn activate_bom(
    State(state): State<AppState>,
    Path(bom_id): Path<i64>,
) -> AppResult<Json<BillOfMaterials>> {
    let service = BomService::new(state.db);
    let bom = service.activate(bom_id).await?;
    Ok(Json(bom))
}

pub async fn obsolete_bom(
    State(state): State<AppState>,
    Path(bom_id): Path<i64>,
) -> AppResult<Json<BillOfMaterials>> {
    let service = BomService::new(state.db);
    let bom = service.obsolete(bom_id).await?;
    Ok(Json(bom))
}

/// Copy a BOM into a new draft version
pub async fn copy_bom(
    State(state): State<AppState>,
    actor: Actor,
    Path(bom_id): Path<i64>,
    Json(input): Json<CopyBomInput>,
) -> AppResult<Json<BomWithComponents>> {
    let service = BomService::new(state.db);
    let bom = service.copy(bom_id, input, actor.id()).await?;
    Ok(Json(bom))
}

/// Standard cost per finished unit
pub async fn get_bom_cost(
    State(state): State<AppState>,
    Path(bom_id): Path<i64>,
) -> AppResult<Json<BomCost>> {
    let service = BomService::new(state.db);
    let cost = service.standard_cost(bom_id).await?;
    Ok(Json(cost))
}
