//! HTTP handlers for external processing

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::StatusQuery;
use crate::error::AppResult;
use crate::middleware::Actor;
use crate::models::{ExternalProcess, ExternalProcessStatus};
use crate::services::external_process::{
    ExternalProcessWithBatches, SendExternalProcessInput, UpdateExternalProcessInput,
};
use crate::services::ExternalProcessService;
use crate::AppState;

/// Send material out for processing
pub async fn send_external_process(
    State(state): State<AppState>,
    actor: Actor,
    Json(input): Json<SendExternalProcessInput>,
) -> AppResult<Json<ExternalProcessWithBatches>> {
    let service = ExternalProcessService::new(state.db, state.config.ledger.clone());
    let process = service.send(input, actor.id()).await?;
    Ok(Json(process))
}

pub async fn list_external_processes(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery<ExternalProcessStatus>>,
) -> AppResult<Json<Vec<ExternalProcess>>> {
    let service = ExternalProcessService::new(state.db, state.config.ledger.clone());
    let processes = service.list(query.status).await?;
    Ok(Json(processes))
}

pub async fn get_external_process(
    State(state): State<AppState>,
    Path(process_id): Path<i64>,
) -> AppResult<Json<ExternalProcessWithBatches>> {
    let service = ExternalProcessService::new(state.db, state.config.ledger.clone());
    let process = service.get(process_id).await?;
    Ok(Json(process))
}

pub async fn update_external_process(
    State(state): State<AppState>,
    Path(process_id): Path<i64>,
    Json(input): Json<UpdateExternalProcessInput>,
) -> AppResult<Json<ExternalProcess>> {
    let service = ExternalProcessService::new(state.db, state.config.ledger.clone());
    let process = service.update(process_id, input).await?;
    Ok(Json(process))
}
