//! Return-request approval workflow
//!
//! A kitchen worker submits a request to hand unused shift stock back;
//! an inventory officer approves or rejects it. Submission validates
//! strictly against the ledger's returnable amounts, approval clamps
//! instead (usage may have drifted while the request sat in the queue).

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{LedgerStatus, ReturnRequest, ReturnRequestLine, ReturnRequestStatus};
use shared::validation::validate_positive_quantity;

use crate::error::{AppError, AppResult};
use crate::services::shift_ledger::ShiftLedgerService;
use crate::services::stock::StockService;

/// Return request service
#[derive(Clone)]
pub struct ReturnRequestService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct ReturnRequestRow {
    id: Uuid,
    worker_id: Uuid,
    ledger_record_id: Uuid,
    branch_id: Uuid,
    items: sqlx::types::Json<Vec<ReturnRequestLine>>,
    status: String,
    notes: Option<String>,
    rejection_reason: Option<String>,
    reviewed_by: Option<Uuid>,
    reviewed_at: Option<chrono::DateTime<Utc>>,
    created_at: chrono::DateTime<Utc>,
}

impl ReturnRequestRow {
    fn into_model(self) -> AppResult<ReturnRequest> {
        let status = ReturnRequestStatus::from_str(&self.status).ok_or_else(|| {
            AppError::Internal(format!("unknown return request status: {}", self.status))
        })?;
        Ok(ReturnRequest {
            id: self.id,
            worker_id: self.worker_id,
            ledger_record_id: self.ledger_record_id,
            branch_id: self.branch_id,
            items: self.items.0,
            status,
            notes: self.notes,
            rejection_reason: self.rejection_reason,
            reviewed_by: self.reviewed_by,
            reviewed_at: self.reviewed_at,
            created_at: self.created_at,
        })
    }
}

const RETURN_REQUEST_COLUMNS: &str = r#"
    id, worker_id, ledger_record_id, branch_id, items, status, notes,
    rejection_reason, reviewed_by, reviewed_at, created_at
"#;

/// One line of a submitted return request
#[derive(Debug, Deserialize)]
pub struct SubmitReturnLine {
    pub stock_item_id: Uuid,
    pub quantity: Decimal,
}

/// Input for submitting a return request
#[derive(Debug, Deserialize)]
pub struct SubmitReturnInput {
    pub ledger_record_id: Uuid,
    pub lines: Vec<SubmitReturnLine>,
    pub notes: Option<String>,
}

impl ReturnRequestService {
    /// Create a new ReturnRequestService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Submit a return request. Each line is validated strictly against
    /// the ledger's current returnable quantity; an over-request is
    /// rejected here rather than silently trimmed, so the worker sees
    /// the real maximum before anything is queued for review.
    pub async fn submit(
        &self,
        branch_id: Uuid,
        worker_id: Uuid,
        input: SubmitReturnInput,
    ) -> AppResult<ReturnRequest> {
        if input.lines.is_empty() {
            return Err(AppError::Validation {
                field: "lines".to_string(),
                message: "At least one return line is required".to_string(),
            });
        }
        for line in &input.lines {
            if let Err(msg) = validate_positive_quantity(line.quantity) {
                return Err(AppError::Validation {
                    field: "quantity".to_string(),
                    message: msg.to_string(),
                });
            }
        }

        let mut tx = self.db.begin().await?;
        let record =
            ShiftLedgerService::fetch_record_for_update(&mut tx, branch_id, input.ledger_record_id)
                .await?;

        if record.worker_id != worker_id {
            return Err(AppError::NotAuthorized(
                "ledger record belongs to a different worker".to_string(),
            ));
        }
        if record.status == LedgerStatus::Returned {
            return Err(AppError::LedgerClosed(format!(
                "record {} is fully returned",
                record.id
            )));
        }

        // snapshot item names/units from the ledger lines at submission
        let items: Vec<ReturnRequestLine> = input
            .lines
            .iter()
            .map(|line| {
                let ledger_line = record
                    .line(line.stock_item_id)
                    .ok_or(AppError::NotFound("Ledger line".to_string()))?;
                Ok(ReturnRequestLine {
                    stock_item_id: line.stock_item_id,
                    name: ledger_line.name.clone(),
                    unit: ledger_line.unit.clone(),
                    return_quantity: line.quantity,
                })
            })
            .collect::<AppResult<_>>()?;

        if let Some((line, max)) = ReturnRequest::first_excessive_line(&items, &record) {
            return Err(AppError::ExceedsReturnable(format!(
                "{}: requested {}, returnable {}",
                line.name, line.return_quantity, max
            )));
        }

        let row = sqlx::query_as::<_, ReturnRequestRow>(&format!(
            r#"
            INSERT INTO return_requests (worker_id, ledger_record_id, branch_id, items, status, notes)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            RETURNING {RETURN_REQUEST_COLUMNS}
            "#
        ))
        .bind(worker_id)
        .bind(input.ledger_record_id)
        .bind(branch_id)
        .bind(sqlx::types::Json(&items))
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.into_model()
    }

    /// Approve a pending request: credit each line back to the warehouse
    /// and record the return on the ledger. Quantities are re-validated
    /// with the clamp, so a line whose remaining shrank since submission
    /// returns what is still returnable instead of failing the review.
    pub async fn approve(
        &self,
        branch_id: Uuid,
        reviewer_id: Uuid,
        request_id: Uuid,
    ) -> AppResult<ReturnRequest> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let request = Self::fetch_pending_for_update(&mut tx, branch_id, request_id).await?;

        let mut record = ShiftLedgerService::fetch_record_for_update(
            &mut tx,
            branch_id,
            request.ledger_record_id,
        )
        .await?;

        for line in &request.items {
            let actual = record.apply_return(line.stock_item_id, line.return_quantity, now);
            if actual < line.return_quantity {
                tracing::warn!(
                    request_id = %request.id,
                    item = %line.name,
                    requested = %line.return_quantity,
                    returned = %actual,
                    "return clamped to remaining at approval"
                );
            }
            if actual > Decimal::ZERO {
                let mut item =
                    StockService::fetch_item_for_update(&mut tx, branch_id, line.stock_item_id)
                        .await?;
                item.restock(actual, now);
                StockService::persist_item(&mut tx, &item).await?;
                StockService::persist_movements(&mut tx, item.id, &item.movements).await?;
            }
        }

        ShiftLedgerService::persist_record(&mut tx, &record).await?;

        let row = sqlx::query_as::<_, ReturnRequestRow>(&format!(
            r#"
            UPDATE return_requests
            SET status = 'approved', reviewed_by = $1, reviewed_at = $2
            WHERE id = $3
            RETURNING {RETURN_REQUEST_COLUMNS}
            "#
        ))
        .bind(reviewer_id)
        .bind(now)
        .bind(request.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(request_id = %request.id, reviewer = %reviewer_id, "return request approved");
        row.into_model()
    }

    /// Reject a pending request with a reason. Nothing moves: the
    /// ledger and warehouse are untouched.
    pub async fn reject(
        &self,
        branch_id: Uuid,
        reviewer_id: Uuid,
        request_id: Uuid,
        reason: String,
    ) -> AppResult<ReturnRequest> {
        if reason.trim().is_empty() {
            return Err(AppError::Validation {
                field: "reason".to_string(),
                message: "A rejection reason is required".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;
        let request = Self::fetch_pending_for_update(&mut tx, branch_id, request_id).await?;

        let row = sqlx::query_as::<_, ReturnRequestRow>(&format!(
            r#"
            UPDATE return_requests
            SET status = 'rejected', rejection_reason = $1, reviewed_by = $2, reviewed_at = $3
            WHERE id = $4
            RETURNING {RETURN_REQUEST_COLUMNS}
            "#
        ))
        .bind(&reason)
        .bind(reviewer_id)
        .bind(Utc::now())
        .bind(request.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.into_model()
    }

    /// Get one request
    pub async fn get_request(&self, branch_id: Uuid, request_id: Uuid) -> AppResult<ReturnRequest> {
        let row = sqlx::query_as::<_, ReturnRequestRow>(&format!(
            "SELECT {RETURN_REQUEST_COLUMNS} FROM return_requests WHERE id = $1 AND branch_id = $2"
        ))
        .bind(request_id)
        .bind(branch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Return request".to_string()))?;
        row.into_model()
    }

    /// The review queue: pending requests, oldest first
    pub async fn pending_requests(&self, branch_id: Uuid) -> AppResult<Vec<ReturnRequest>> {
        let rows = sqlx::query_as::<_, ReturnRequestRow>(&format!(
            r#"
            SELECT {RETURN_REQUEST_COLUMNS} FROM return_requests
            WHERE branch_id = $1 AND status = 'pending'
            ORDER BY created_at ASC
            "#
        ))
        .bind(branch_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(|r| r.into_model()).collect()
    }

    /// A worker's own requests, newest first
    pub async fn requests_for_worker(
        &self,
        branch_id: Uuid,
        worker_id: Uuid,
    ) -> AppResult<Vec<ReturnRequest>> {
        let rows = sqlx::query_as::<_, ReturnRequestRow>(&format!(
            r#"
            SELECT {RETURN_REQUEST_COLUMNS} FROM return_requests
            WHERE branch_id = $1 AND worker_id = $2
            ORDER BY created_at DESC
            "#
        ))
        .bind(branch_id)
        .bind(worker_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(|r| r.into_model()).collect()
    }

    async fn fetch_pending_for_update(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        branch_id: Uuid,
        request_id: Uuid,
    ) -> AppResult<ReturnRequest> {
        let row = sqlx::query_as::<_, ReturnRequestRow>(&format!(
            "SELECT {RETURN_REQUEST_COLUMNS} FROM return_requests
             WHERE id = $1 AND branch_id = $2 FOR UPDATE"
        ))
        .bind(request_id)
        .bind(branch_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Return request".to_string()))?;

        let request = row.into_model()?;
        if request.status.is_terminal() {
            return Err(AppError::InvalidTransition(format!(
                "return request already {}",
                request.status.as_str()
            )));
        }
        Ok(request)
    }
}
