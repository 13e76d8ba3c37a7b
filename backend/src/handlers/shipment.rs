//! HTTP handlers for shipments

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::StatusQuery;
use crate::error::AppResult;
use crate::middleware::Actor;
use crate::models::{Shipment, ShipmentStatus};
use crate::services::shipment::{CreateShipmentInput, ShipShipmentInput, ShipmentWithLines};
use crate::services::ShipmentService;
use crate::AppState;

fn shipment_service(state: &AppState) -> ShipmentService {
    ShipmentService::new(state.db.clone(), state.config.ledger.clone())
}

/// Create a shipment, drawing stock by FIFO
pub async fn create_shipment(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<CreateShipmentInput>,
) -> AppResult<Json<ShipmentWithLines>> {
    let shipment = shipment_service(&state).create(input, actor.id()).await?;
    Ok(Json(shipment))
}

pub async fn list_shipments(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery<ShipmentStatus>>,
) -> AppResult<Json<Vec<Shipment>>> {
    let shipments = shipment_service(&state).list(query.status).await?;
    Ok(Json(shipments))
}

pub async fn get_shipment(
    State(state): State<AppState>,
    Path(shipment_id): Path<i64>,
) -> AppResult<Json<ShipmentWithLines>> {
    let shipment = shipment_service(&state).get(shipment_id).await?;
    Ok(Json(shipment))
}

pub async fn ship_shipment(
    State(state): State<AppState>,
    Path(shipment_id): Path<i64>,
    Json(input): Json<ShipShipmentInput>,
) -> AppResult<Json<Shipment>> {
    let shipment = shipment_service(&state).ship(shipment_id, input).await?;
    Ok(Json(shipment))
}

pub async fn deliver_shipment(
    State(state): State<AppState>,
    Path(shipment_id): Path<i64>,
) -> AppResult<Json<Shipment>> {
    let shipment = shipment_service(&state).deliver(shipment_id).await?;
    Ok(Json(shipment))
}

pub async fn cancel_shipment(
    State(state): State<AppState>,
    Path(shipment_id): Path<i64>,
) -> AppResult<Json<Shipment>> {
    let shipment = shipment_service(&state).cancel(shipment_id).await?;
    Ok(Json(shipment))
}
