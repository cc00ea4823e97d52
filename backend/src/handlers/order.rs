//! HTTP handlers for order management endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::models::Order;

use crate::error::AppResult;
use crate::middleware::CurrentWorker;
use crate::services::order::{
    CreateOrderInput, OrderFilter, TransitionOutcome, UpdateStatusInput,
};
use crate::AppState;

fn order_service(state: &AppState) -> crate::services::OrderService {
    crate::services::OrderService::new(
        state.db.clone(),
        crate::services::CatalogService::new(state.db.clone()),
        crate::services::NotificationService::new(state.db.clone()),
        state.config.order.clone(),
        state.config.deduction.clone(),
    )
}

/// Create an order
pub async fn create_order(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<Json<Order>> {
    let order = order_service(&state).create_order(&worker, input).await?;
    Ok(Json(order))
}

/// Get a single order
pub async fn get_order(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let order = order_service(&state)
        .get_order(worker.branch_id, order_id)
        .await?;
    Ok(Json(order))
}

/// List orders with optional filters
pub async fn list_orders(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<Vec<Order>>> {
    let orders = order_service(&state)
        .list_orders(worker.branch_id, filter)
        .await?;
    Ok(Json(orders))
}

/// The kitchen queue of unclaimed orders
pub async fn pending_orders(
    State(state): State<AppState>,
    worker: CurrentWorker,
) -> AppResult<Json<Vec<Order>>> {
    let orders = order_service(&state).pending_orders(worker.branch_id).await?;
    Ok(Json(orders))
}

/// Orders the calling chef has claimed and not yet finished
pub async fn my_active_orders(
    State(state): State<AppState>,
    worker: CurrentWorker,
) -> AppResult<Json<Vec<Order>>> {
    let orders = order_service(&state)
        .active_orders_for_chef(worker.branch_id, worker.worker_id)
        .await?;
    Ok(Json(orders))
}

/// Chef claims a pending order
pub async fn accept_order(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let order = order_service(&state).accept_order(&worker, order_id).await?;
    Ok(Json(order))
}

/// Drive the order state machine
pub async fn update_order_status(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateStatusInput>,
) -> AppResult<Json<TransitionOutcome>> {
    let outcome = order_service(&state)
        .update_status(&worker, order_id, input)
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderInput {
    pub reason: Option<String>,
}

/// Cancel an order within the cancellation window
pub async fn cancel_order(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(order_id): Path<Uuid>,
    Json(input): Json<CancelOrderInput>,
) -> AppResult<Json<Order>> {
    let order = order_service(&state)
        .cancel_order(&worker, order_id, input.reason)
        .await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct AddDelayInput {
    pub minutes: i32,
}

/// Chef flags extra preparation time
pub async fn add_order_delay(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(order_id): Path<Uuid>,
    Json(input): Json<AddDelayInput>,
) -> AppResult<Json<Order>> {
    let order = order_service(&state)
        .add_delay(&worker, order_id, input.minutes)
        .await?;
    Ok(Json(order))
}
