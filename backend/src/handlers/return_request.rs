//! HTTP handlers for the return-request approval workflow

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared::models::ReturnRequest;

use crate::error::AppResult;
use crate::middleware::CurrentWorker;
use crate::services::return_request::SubmitReturnInput;
use crate::services::ReturnRequestService;
use crate::AppState;

/// Submit a return request for review
pub async fn submit_return_request(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Json(input): Json<SubmitReturnInput>,
) -> AppResult<Json<ReturnRequest>> {
    let service = ReturnRequestService::new(state.db);
    let request = service
        .submit(worker.branch_id, worker.worker_id, input)
        .await?;
    Ok(Json(request))
}

/// Get one return request
pub async fn get_return_request(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<ReturnRequest>> {
    let service = ReturnRequestService::new(state.db);
    let request = service.get_request(worker.branch_id, request_id).await?;
    Ok(Json(request))
}

/// The review queue of pending requests
pub async fn pending_return_requests(
    State(state): State<AppState>,
    worker: CurrentWorker,
) -> AppResult<Json<Vec<ReturnRequest>>> {
    let service = ReturnRequestService::new(state.db);
    let requests = service.pending_requests(worker.branch_id).await?;
    Ok(Json(requests))
}

/// The calling worker's own requests
pub async fn my_return_requests(
    State(state): State<AppState>,
    worker: CurrentWorker,
) -> AppResult<Json<Vec<ReturnRequest>>> {
    let service = ReturnRequestService::new(state.db);
    let requests = service
        .requests_for_worker(worker.branch_id, worker.worker_id)
        .await?;
    Ok(Json(requests))
}

/// Approve a pending request
pub async fn approve_return_request(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<ReturnRequest>> {
    let service = ReturnRequestService::new(state.db);
    let request = service
        .approve(worker.branch_id, worker.worker_id, request_id)
        .await?;
    Ok(Json(request))
}

#[derive(Debug, Deserialize)]
pub struct RejectReturnInput {
    pub reason: String,
}

/// Reject a pending request with a reason
pub async fn reject_return_request(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Path(request_id): Path<Uuid>,
    Json(input): Json<RejectReturnInput>,
) -> AppResult<Json<ReturnRequest>> {
    let service = ReturnRequestService::new(state.db);
    let request = service
        .reject(worker.branch_id, worker.worker_id, request_id, input.reason)
        .await?;
    Ok(Json(request))
}
