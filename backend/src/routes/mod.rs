//! Route definitions for the Branch Stock Ledger
//!
//! Authentication and authorization sit in front of this service; routes
//! here trust the identity forwarded by the gateway (see
//! `middleware::CurrentUser`).

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Stock ledger
        .nest("/stock", stock_routes())
        // Cross-branch transfers
        .nest("/transfers", transfer_routes())
}

/// Stock ledger routes
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/movements", post(handlers::record_movement))
        .route(
            "/movements/:movement_id",
            put(handlers::edit_movement).delete(handlers::delete_movement),
        )
        .route(
            "/products/:product_id/movements",
            get(handlers::get_movement_history),
        )
        .route(
            "/products/:product_id/reconcile",
            post(handlers::reconcile_product),
        )
        .route(
            "/products/:product_id/bulk-delete",
            post(handlers::bulk_delete_movements),
        )
}

/// Transfer routes
fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_transfers).post(handlers::create_transfer),
        )
        .route("/:transfer_id", get(handlers::get_transfer))
}
