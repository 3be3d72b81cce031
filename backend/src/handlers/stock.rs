//! HTTP handlers for stock ledger endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::types::{PaginatedResponse, Pagination};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::ledger::StockMovement;
use crate::services::stock::{
    BulkDeleteOutcome, EditMovementInput, RecordMovementInput, RecordedMovement, StockService,
};
use crate::AppState;

/// Record a stock movement
pub async fn record_movement(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RecordMovementInput>,
) -> AppResult<Json<RecordedMovement>> {
    let service = StockService::new(state.db, state.config.ledger.clone());
    let recorded = service.record_movement(current_user.0, input).await?;
    Ok(Json(recorded))
}

/// Get movement history for a product
pub async fn get_movement_history(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<StockMovement>>> {
    let service = StockService::new(state.db, state.config.ledger.clone());
    let history = service.movement_history(product_id, pagination).await?;
    Ok(Json(history))
}

/// Edit a movement, recalculating the rest of the chain
pub async fn edit_movement(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
    Json(input): Json<EditMovementInput>,
) -> AppResult<Json<StockMovement>> {
    let service = StockService::new(state.db, state.config.ledger.clone());
    let movement = service.edit_movement(movement_id, input).await?;
    Ok(Json(movement))
}

/// Delete a movement, recalculating the rest of the chain
pub async fn delete_movement(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<StockResponse>> {
    let service = StockService::new(state.db, state.config.ledger.clone());
    let stock = service.delete_movement(movement_id).await?;
    Ok(Json(StockResponse { stock }))
}

/// Recompute a product's cached stock from its ledger
pub async fn reconcile_product(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<StockResponse>> {
    let service = StockService::new(state.db, state.config.ledger.clone());
    let stock = service.reconcile(product_id).await?;
    Ok(Json(StockResponse { stock }))
}

/// Bulk delete movements by reference without chain recalculation
pub async fn bulk_delete_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<BulkDeleteRequest>,
) -> AppResult<Json<BulkDeleteOutcome>> {
    let service = StockService::new(state.db, state.config.ledger.clone());
    let outcome = service
        .bulk_delete_without_recalculation(product_id, input.reference_id, input.reference_type)
        .await?;
    Ok(Json(outcome))
}

/// Request body for bulk deletes
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub reference_id: Uuid,
    pub reference_type: Option<String>,
}

/// Response carrying a product's stock value
#[derive(Debug, serde::Serialize)]
pub struct StockResponse {
    pub stock: i64,
}
