//! In-app notification rows for order status changes
//!
//! Delivery is best-effort: a failed insert is logged and swallowed so a
//! notification problem can never block a status transition.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{Order, OrderStatus};

use crate::error::AppResult;

/// Notification service
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
}

/// A stored notification
#[derive(Debug, Serialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub status: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationService {
    /// Create a new NotificationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Notify whoever placed the order about its new status. Orders
    /// without a placing worker (counter sales) are skipped.
    pub async fn notify_order_status(&self, order: &Order, status: OrderStatus) {
        let Some(recipient_id) = order.notify_recipient() else {
            return;
        };

        let message = format!("Order {} is now {}", order.order_number, status.as_str());
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (recipient_id, order_id, order_number, status, message)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(recipient_id)
        .bind(order.id)
        .bind(&order.order_number)
        .bind(status.as_str())
        .bind(&message)
        .execute(&self.db)
        .await;

        if let Err(err) = result {
            tracing::warn!(
                order_id = %order.id,
                error = %err,
                "failed to record status notification"
            );
        }
    }

    /// Unread notifications for a worker, newest first
    pub async fn unread_for_worker(&self, worker_id: Uuid) -> AppResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_id, order_id, order_number, status, message, is_read, created_at
            FROM notifications
            WHERE recipient_id = $1 AND is_read = false
            ORDER BY created_at DESC
            "#,
        )
        .bind(worker_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Mark a worker's notifications as read
    pub async fn mark_read(&self, worker_id: Uuid, ids: &[Uuid]) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true WHERE recipient_id = $1 AND id = ANY($2)",
        )
        .bind(worker_id)
        .bind(ids)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}
