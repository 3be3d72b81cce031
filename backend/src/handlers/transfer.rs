//! HTTP handlers for transfer endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::transfer::{TransferInput, TransferService, TransferWithItems};
use crate::AppState;

/// Execute an atomic cross-branch transfer
pub async fn create_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<TransferInput>,
) -> AppResult<Json<TransferWithItems>> {
    let service = TransferService::new(state.db);
    let transfer = service.transfer(current_user.0, input).await?;
    Ok(Json(transfer))
}

/// Get a transfer with its audit lines
pub async fn get_transfer(
    State(state): State<AppState>,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<TransferWithItems>> {
    let service = TransferService::new(state.db);
    let transfer = service.get_transfer(transfer_id).await?;
    Ok(Json(transfer))
}

/// List transfers, optionally filtered to one branch
pub async fn list_transfers(
    State(state): State<AppState>,
    Query(query): Query<TransferListQuery>,
) -> AppResult<Json<Vec<TransferWithItems>>> {
    let service = TransferService::new(state.db);
    let transfers = service.list_transfers(query.branch_id).await?;
    Ok(Json(transfers))
}

/// Query parameters for listing transfers
#[derive(Debug, Deserialize)]
pub struct TransferListQuery {
    pub branch_id: Option<Uuid>,
}
