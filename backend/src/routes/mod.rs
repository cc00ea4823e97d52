//! Route definitions for the Restaurant Operations Platform

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Order lifecycle
        .nest("/orders", order_routes())
        // Warehouse stock
        .nest("/stock", stock_routes())
        // Shift issuance ledger
        .nest("/shift-ledgers", shift_ledger_routes())
        // Return-request approval workflow
        .nest("/return-requests", return_request_routes())
        // In-app notifications
        .nest("/notifications", notification_routes())
}

/// Order management routes
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/pending", get(handlers::pending_orders))
        .route("/mine", get(handlers::my_active_orders))
        .route("/:order_id", get(handlers::get_order))
        .route("/:order_id/accept", post(handlers::accept_order))
        .route("/:order_id/status", post(handlers::update_order_status))
        .route("/:order_id/cancel", post(handlers::cancel_order))
        .route("/:order_id/delay", post(handlers::add_order_delay))
}

/// Warehouse stock routes
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::get_stock_overview).post(handlers::create_stock_item),
        )
        .route("/low", get(handlers::get_low_stock_items))
        .route("/purchases", post(handlers::record_purchase))
        .route(
            "/:item_id",
            get(handlers::get_stock_item).delete(handlers::deactivate_stock_item),
        )
        .route("/:item_id/movements", get(handlers::get_stock_movements))
}

/// Shift issuance ledger routes
fn shift_ledger_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_ledger_records).post(handlers::issue_shift_stock),
        )
        .route("/mine/today", get(handlers::my_todays_record))
        .route("/:record_id", get(handlers::get_ledger_record))
        .route("/:record_id/usage", post(handlers::record_ledger_usage))
        .route("/:record_id/returns", post(handlers::direct_ledger_return))
}

/// Return-request workflow routes
fn return_request_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::pending_return_requests).post(handlers::submit_return_request),
        )
        .route("/mine", get(handlers::my_return_requests))
        .route("/:request_id", get(handlers::get_return_request))
        .route("/:request_id/approve", post(handlers::approve_return_request))
        .route("/:request_id/reject", post(handlers::reject_return_request))
}

/// Notification routes
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_notifications))
        .route("/mark-read", post(handlers::mark_notifications_read))
}
