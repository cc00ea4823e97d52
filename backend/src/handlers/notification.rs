//! HTTP handlers for in-app notifications

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentWorker;
use crate::services::notification::Notification;
use crate::services::NotificationService;
use crate::AppState;

/// Unread notifications for the calling worker
pub async fn get_notifications(
    State(state): State<AppState>,
    worker: CurrentWorker,
) -> AppResult<Json<Vec<Notification>>> {
    let service = NotificationService::new(state.db);
    let notifications = service.unread_for_worker(worker.worker_id).await?;
    Ok(Json(notifications))
}

#[derive(Debug, Deserialize)]
pub struct MarkReadInput {
    pub ids: Vec<Uuid>,
}

/// Mark notifications as read
pub async fn mark_notifications_read(
    State(state): State<AppState>,
    worker: CurrentWorker,
    Json(input): Json<MarkReadInput>,
) -> AppResult<Json<u64>> {
    let service = NotificationService::new(state.db);
    let updated = service.mark_read(worker.worker_id, &input.ids).await?;
    Ok(Json(updated))
}
