//! HTTP handlers for warehouse stock endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use shared::models::StockItem;

use crate::error::AppResult;
use crate::middleware::CurrentWorker;
use crate::services::stock::{
    CreateStockItemInput, RecordPurchaseInput, StockMovementRow, StockOverviewEntry,
};
use crate::services::StockService;
use crate::AppState;

/// Create a warehouse stock item
pub async fn create_stock_item(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Json(input): Json<CreateStockItemInput>,
) -> AppResult<Json<StockItem>> {
    let service = StockService::new(state.db);
    let item = service.create_item(worker.branch_id, input).await?;
    Ok(Json(item))
}

/// Get a single stock item
pub async fn get_stock_item(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<StockItem>> {
    let service = StockService::new(state.db);
    let item = service.get_item(worker.branch_id, item_id).await?;
    Ok(Json(item))
}

/// Deactivate a stock item
pub async fn deactivate_stock_item(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = StockService::new(state.db);
    service.deactivate_item(worker.branch_id, item_id).await?;
    Ok(Json(()))
}

/// Record a stock purchase
pub async fn record_purchase(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Json(input): Json<RecordPurchaseInput>,
) -> AppResult<Json<StockItem>> {
    let service = StockService::new(state.db);
    let item = service.record_purchase(worker.branch_id, input).await?;
    Ok(Json(item))
}

/// Stock overview with valuation and low/out flags
pub async fn get_stock_overview(
    State(state): State<AppState>,
    worker: CurrentWorker,
) -> AppResult<Json<Vec<StockOverviewEntry>>> {
    let service = StockService::new(state.db);
    let overview = service.get_stock_overview(worker.branch_id).await?;
    Ok(Json(overview))
}

/// Items at or below their reorder threshold
pub async fn get_low_stock_items(
    State(state): State<AppState>,
    worker: CurrentWorker,
) -> AppResult<Json<Vec<StockItem>>> {
    let service = StockService::new(state.db);
    let items = service.get_low_stock_items(worker.branch_id).await?;
    Ok(Json(items))
}

/// Movement history for an item
pub async fn get_stock_movements(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockMovementRow>>> {
    let service = StockService::new(state.db);
    let movements = service.get_movements(worker.branch_id, item_id).await?;
    Ok(Json(movements))
}
