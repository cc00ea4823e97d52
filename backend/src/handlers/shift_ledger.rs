//! HTTP handlers for shift issuance ledger endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared::models::ShiftLedgerRecord;

use crate::error::AppResult;
use crate::middleware::CurrentWorker;
use crate::services::shift_ledger::{BulkIssueInput, LedgerFilter, ReturnLineInput, ReturnedLine};
use crate::services::ShiftLedgerService;
use crate::AppState;

/// Issue ingredients to a worker for today's shift
pub async fn issue_shift_stock(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Json(input): Json<BulkIssueInput>,
) -> AppResult<Json<ShiftLedgerRecord>> {
    let service = ShiftLedgerService::new(state.db);
    let record = service
        .issue_items(worker.branch_id, worker.worker_id, input)
        .await?;
    Ok(Json(record))
}

/// Get one ledger record
pub async fn get_ledger_record(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(record_id): Path<Uuid>,
) -> AppResult<Json<ShiftLedgerRecord>> {
    let service = ShiftLedgerService::new(state.db);
    let record = service.get_record(worker.branch_id, record_id).await?;
    Ok(Json(record))
}

/// The calling worker's record for today's shift
pub async fn my_todays_record(
    State(state): State<AppState>,
    worker: CurrentWorker,
) -> AppResult<Json<Option<ShiftLedgerRecord>>> {
    let service = ShiftLedgerService::new(state.db);
    let record = service
        .get_todays_record(worker.branch_id, worker.worker_id)
        .await?;
    Ok(Json(record))
}

/// List ledger records with optional filters
pub async fn list_ledger_records(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Query(filter): Query<LedgerFilter>,
) -> AppResult<Json<Vec<ShiftLedgerRecord>>> {
    let service = ShiftLedgerService::new(state.db);
    let records = service.list_records(worker.branch_id, filter).await?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct RecordUsageInput {
    pub stock_item_id: Uuid,
    pub quantity: Decimal,
}

/// Strict manual usage entry against a ledger record
pub async fn record_ledger_usage(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(record_id): Path<Uuid>,
    Json(input): Json<RecordUsageInput>,
) -> AppResult<Json<ShiftLedgerRecord>> {
    let service = ShiftLedgerService::new(state.db);
    let record = service
        .record_usage(worker.branch_id, record_id, input.stock_item_id, input.quantity)
        .await?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct DirectReturnInput {
    pub lines: Vec<ReturnLineInput>,
}

/// Response for a direct return: the updated record plus what each line
/// actually credited after clamping
#[derive(Debug, Serialize)]
pub struct DirectReturnResponse {
    pub record: ShiftLedgerRecord,
    pub lines: Vec<ReturnedLine>,
}

/// Storekeeper-entered return of unused ingredients
pub async fn direct_ledger_return(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(record_id): Path<Uuid>,
    Json(input): Json<DirectReturnInput>,
) -> AppResult<Json<DirectReturnResponse>> {
    let service = ShiftLedgerService::new(state.db);
    let (record, lines) = service
        .direct_return(worker.branch_id, record_id, input.lines)
        .await?;
    Ok(Json(DirectReturnResponse { record, lines }))
}
