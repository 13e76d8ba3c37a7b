//! HTTP handlers for items and locations

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::error::AppResult;
use crate::models::{Item, Location};
use crate::services::inventory::{ItemStock, LocationCapacity};
use crate::services::item::{CreateItemInput, CreateLocationInput, ItemListQuery, UpdateItemInput};
use crate::services::{InventoryService, ItemService};
use crate::AppState;

/// Create an item
pub async fn create_item(
    State(state): State<AppState>,
    Json(input): Json<CreateItemInput>,
) -> AppResult<Json<Item>> {
    let service = ItemService::new(state.db);
    let item = service.create_item(input).await?;
    Ok(Json(item))
}

/// List items, optionally filtered by SKU or name
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemListQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let service = ItemService::new(state.db);
    let items = service.list_items(query).await?;
    Ok(Json(items))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> AppResult<Json<Item>> {
    let service = ItemService::new(state.db);
    let item = service.get_item(item_id).await?;
    Ok(Json(item))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<Json<Item>> {
    let service = ItemService::new(state.db);
    let item = service.update_item(item_id, input).await?;
    Ok(Json(item))
}

/// Stock of an item per location
pub async fn get_item_stock(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> AppResult<Json<ItemStock>> {
    let service = InventoryService::new(state.db, state.config.ledger.clone());
    let stock = service.stock_by_item(item_id).await?;
    Ok(Json(stock))
}

/// Create a location
pub async fn create_location(
    State(state): State<AppState>,
    Json(input): Json<CreateLocationInput>,
) -> AppResult<Json<Location>> {
    let service = ItemService::new(state.db);
    let location = service.create_location(input).await?;
    Ok(Json(location))
}

pub async fn list_locations(State(state): State<AppState>) -> AppResult<Json<Vec<Location>>> {
    let service = ItemService::new(state.db);
    let locations = service.list_locations().await?;
    Ok(Json(locations))
}

pub async fn get_location(
    State(state): State<AppState>,
    Path(location_id): Path<i64>,
) -> AppResult<Json<Location>> {
    let service = ItemService::new(state.db);
    let location = service.get_location(location_id).await?;
    Ok(Json(location))
}

/// Capacity usage of a location
pub async fn get_location_capacity(
    State(state): State<AppState>,
    Path(location_id): Path<i64>,
) -> AppResult<Json<LocationCapacity>> {
    let service = InventoryService::new(state.db, state.config.ledger.clone());
    let capacity = service.location_capacity(location_id).await?;
    Ok(Json(capacity))
}
