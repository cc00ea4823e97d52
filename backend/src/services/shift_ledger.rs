//! Shift issuance ledger service
//!
//! A storekeeper issues ingredients to a kitchen worker at shift start;
//! usage accrues as orders become ready; leftovers come back either as a
//! direct return or through the approval workflow. One record per worker
//! per shift day, found via [`ShiftWindow`].

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::models::{LedgerLine, LedgerStatus, ShiftLedgerRecord};
use shared::types::ShiftWindow;
use shared::validation::validate_positive_quantity;

use crate::error::{AppError, AppResult};
use crate::services::stock::StockService;

/// Shift ledger service
#[derive(Clone)]
pub struct ShiftLedgerService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct ShiftLedgerRow {
    id: Uuid,
    worker_id: Uuid,
    branch_id: Uuid,
    shift_date: chrono::NaiveDate,
    status: String,
    issued_by: Option<Uuid>,
    returned_at: Option<chrono::DateTime<Utc>>,
    notes: Option<String>,
}

#[derive(Debug, FromRow)]
struct LedgerLineRow {
    stock_item_id: Uuid,
    name: String,
    unit: String,
    issued: Decimal,
    used: Decimal,
    returned: Decimal,
}

impl ShiftLedgerRow {
    fn into_model(self, lines: Vec<LedgerLineRow>) -> AppResult<ShiftLedgerRecord> {
        let status = LedgerStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("unknown ledger status: {}", self.status)))?;
        Ok(ShiftLedgerRecord {
            id: self.id,
            worker_id: self.worker_id,
            branch_id: self.branch_id,
            shift_date: self.shift_date,
            status,
            lines: lines
                .into_iter()
                .map(|l| LedgerLine {
                    stock_item_id: l.stock_item_id,
                    name: l.name,
                    unit: l.unit,
                    issued: l.issued,
                    used: l.used,
                    returned: l.returned,
                })
                .collect(),
            issued_by: self.issued_by,
            returned_at: self.returned_at,
            notes: self.notes,
        })
    }
}

/// One issuance line in a bulk issue request
#[derive(Debug, Deserialize)]
pub struct IssueLineInput {
    pub stock_item_id: Uuid,
    pub quantity: Decimal,
}

/// Bulk issuance of ingredients to a worker for today's shift
#[derive(Debug, Deserialize)]
pub struct BulkIssueInput {
    pub worker_id: Uuid,
    pub lines: Vec<IssueLineInput>,
    pub notes: Option<String>,
}

/// One line of a direct (storekeeper-entered) return
#[derive(Debug, Deserialize)]
pub struct ReturnLineInput {
    pub stock_item_id: Uuid,
    pub quantity: Decimal,
}

/// Echo of what a return actually credited, after clamping
#[derive(Debug, Serialize)]
pub struct ReturnedLine {
    pub stock_item_id: Uuid,
    pub requested: Decimal,
    pub returned: Decimal,
}

/// Query filters for listing ledger records
#[derive(Debug, Default, Deserialize)]
pub struct LedgerFilter {
    pub worker_id: Option<Uuid>,
    pub status: Option<LedgerStatus>,
    pub shift_date: Option<chrono::NaiveDate>,
}

impl ShiftLedgerService {
    /// Create a new ShiftLedgerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Issue ingredients to a worker for today's shift. Decrements the
    /// warehouse and upserts lines onto the worker's active record,
    /// creating the record on first issuance of the day. The whole batch
    /// commits or none of it does.
    pub async fn issue_items(
        &self,
        branch_id: Uuid,
        issued_by: Uuid,
        input: BulkIssueInput,
    ) -> AppResult<ShiftLedgerRecord> {
        if input.lines.is_empty() {
            return Err(AppError::Validation {
                field: "lines".to_string(),
                message: "At least one issuance line is required".to_string(),
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

        let now = Utc::now();
        let window = ShiftWindow::containing(now);
        let mut tx = self.db.begin().await?;

        let mut record = match Self::fetch_active_record_for_update(
            &mut tx,
            branch_id,
            input.worker_id,
            window.date,
        )
        .await?
        {
            Some(record) => record,
            None => {
                let record = ShiftLedgerRecord::new(input.worker_id, branch_id, window.date);
                Self::insert_record(&mut tx, &record).await?;
                record
            }
        };

        for line in &input.lines {
            let mut item =
                StockService::fetch_item_for_update(&mut tx, branch_id, line.stock_item_id).await?;
            // issuance is never clamped: the storekeeper cannot hand out
            // stock the warehouse does not hold
            if item.current_stock < line.quantity {
                return Err(AppError::InsufficientStock(format!(
                    "{}: requested {}, available {}",
                    item.name, line.quantity, item.current_stock
                )));
            }
            item.deduct(line.quantity, now);
            StockService::persist_item(&mut tx, &item).await?;
            StockService::persist_movements(&mut tx, item.id, &item.movements).await?;

            record.add_issue(item.id, &item.name, item.unit.as_str(), line.quantity)?;
        }

        record.issued_by = Some(issued_by);
        if input.notes.is_some() {
            record.notes = input.notes;
        }
        Self::persist_record(&mut tx, &record).await?;

        tx.commit().await?;

        tracing::info!(
            worker_id = %record.worker_id,
            record_id = %record.id,
            lines = record.lines.len(),
            "issued shift stock"
        );
        Ok(record)
    }

    /// Strict usage recording for manual corrections. Unlike deduction
    /// attribution this rejects over-issue outright.
    pub async fn record_usage(
        &self,
        branch_id: Uuid,
        record_id: Uuid,
        stock_item_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<ShiftLedgerRecord> {
        if let Err(msg) = validate_positive_quantity(quantity) {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: msg.to_string(),
            });
        }

        let mut tx = self.db.begin().await?;
        let mut record = Self::fetch_record_for_update(&mut tx, branch_id, record_id).await?;
        record.record_usage(stock_item_id, quantity)?;
        Self::persist_record(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Storekeeper-entered return of unused ingredients. Quantities are
    /// clamped to what is actually returnable; the clamped amounts are
    /// credited back to the warehouse and echoed to the caller.
    pub async fn direct_return(
        &self,
        branch_id: Uuid,
        record_id: Uuid,
        lines: Vec<ReturnLineInput>,
    ) -> AppResult<(ShiftLedgerRecord, Vec<ReturnedLine>)> {
        if lines.is_empty() {
            return Err(AppError::Validation {
                field: "lines".to_string(),
                message: "At least one return line is required".to_string(),
            });
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut record = Self::fetch_record_for_update(&mut tx, branch_id, record_id).await?;

        if record.status == LedgerStatus::Returned {
            return Err(AppError::LedgerClosed(format!(
                "record {} is fully returned",
                record.id
            )));
        }

        let mut outcome = Vec::with_capacity(lines.len());
        for line in &lines {
            let actual = record.apply_return(line.stock_item_id, line.quantity, now);
            if actual > Decimal::ZERO {
                let mut item =
                    StockService::fetch_item_for_update(&mut tx, branch_id, line.stock_item_id)
                        .await?;
                item.restock(actual, now);
                StockService::persist_item(&mut tx, &item).await?;
                StockService::persist_movements(&mut tx, item.id, &item.movements).await?;
            }
            outcome.push(ReturnedLine {
                stock_item_id: line.stock_item_id,
                requested: line.quantity,
                returned: actual,
            });
        }

        Self::persist_record(&mut tx, &record).await?;
        tx.commit().await?;

        Ok((record, outcome))
    }

    /// Get one ledger record with its lines
    pub async fn get_record(&self, branch_id: Uuid, record_id: Uuid) -> AppResult<ShiftLedgerRecord> {
        let row = sqlx::query_as::<_, ShiftLedgerRow>(
            r#"
            SELECT id, worker_id, branch_id, shift_date, status, issued_by, returned_at, notes
            FROM shift_ledgers
            WHERE id = $1 AND branch_id = $2
            "#,
        )
        .bind(record_id)
        .bind(branch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Shift ledger record".to_string()))?;

        let lines = sqlx::query_as::<_, LedgerLineRow>(
            r#"
            SELECT stock_item_id, name, unit, issued, used, returned
            FROM shift_ledger_lines
            WHERE record_id = $1
            ORDER BY name
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.db)
        .await?;

        row.into_model(lines)
    }

    /// The worker's record for today's shift, if one exists
    pub async fn get_todays_record(
        &self,
        branch_id: Uuid,
        worker_id: Uuid,
    ) -> AppResult<Option<ShiftLedgerRecord>> {
        let window = ShiftWindow::containing(Utc::now());
        let row = sqlx::query_as::<_, ShiftLedgerRow>(
            r#"
            SELECT id, worker_id, branch_id, shift_date, status, issued_by, returned_at, notes
            FROM shift_ledgers
            WHERE branch_id = $1 AND worker_id = $2 AND shift_date = $3
            "#,
        )
        .bind(branch_id)
        .bind(worker_id)
        .bind(window.date)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let record_id = row.id;
                let lines = sqlx::query_as::<_, LedgerLineRow>(
                    "SELECT stock_item_id, name, unit, issued, used, returned
                     FROM shift_ledger_lines WHERE record_id = $1 ORDER BY name",
                )
                .bind(record_id)
                .fetch_all(&self.db)
                .await?;
                Ok(Some(row.into_model(lines)?))
            }
            None => Ok(None),
        }
    }

    /// List ledger records for a branch, newest shift first
    pub async fn list_records(
        &self,
        branch_id: Uuid,
        filter: LedgerFilter,
    ) -> AppResult<Vec<ShiftLedgerRecord>> {
        let rows = sqlx::query_as::<_, ShiftLedgerRow>(
            r#"
            SELECT id, worker_id, branch_id, shift_date, status, issued_by, returned_at, notes
            FROM shift_ledgers
            WHERE branch_id = $1
              AND ($2::uuid IS NULL OR worker_id = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::date IS NULL OR shift_date = $4)
            ORDER BY shift_date DESC
            "#,
        )
        .bind(branch_id)
        .bind(filter.worker_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.shift_date)
        .fetch_all(&self.db)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = sqlx::query_as::<_, LedgerLineRow>(
                "SELECT stock_item_id, name, unit, issued, used, returned
                 FROM shift_ledger_lines WHERE record_id = $1 ORDER BY name",
            )
            .bind(row.id)
            .fetch_all(&self.db)
            .await?;
            records.push(row.into_model(lines)?);
        }
        Ok(records)
    }

    // ------------------------------------------------------------------
    // Transaction helpers shared with the order and return-request
    // services, which fold ledger updates into their own transactions.
    // ------------------------------------------------------------------

    pub(crate) async fn fetch_record_for_update(
        tx: &mut Transaction<'_, Postgres>,
        branch_id: Uuid,
        record_id: Uuid,
    ) -> AppResult<ShiftLedgerRecord> {
        let row = sqlx::query_as::<_, ShiftLedgerRow>(
            r#"
            SELECT id, worker_id, branch_id, shift_date, status, issued_by, returned_at, notes
            FROM shift_ledgers
            WHERE id = $1 AND branch_id = $2
            FOR UPDATE
            "#,
        )
        .bind(record_id)
        .bind(branch_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Shift ledger record".to_string()))?;

        let record_id = row.id;
        let lines = sqlx::query_as::<_, LedgerLineRow>(
            "SELECT stock_item_id, name, unit, issued, used, returned
             FROM shift_ledger_lines WHERE record_id = $1 ORDER BY name",
        )
        .bind(record_id)
        .fetch_all(&mut **tx)
        .await?;

        row.into_model(lines)
    }

    pub(crate) async fn fetch_active_record_for_update(
        tx: &mut Transaction<'_, Postgres>,
        branch_id: Uuid,
        worker_id: Uuid,
        shift_date: chrono::NaiveDate,
    ) -> AppResult<Option<ShiftLedgerRecord>> {
        let row = sqlx::query_as::<_, ShiftLedgerRow>(
            r#"
            SELECT id, worker_id, branch_id, shift_date, status, issued_by, returned_at, notes
            FROM shift_ledgers
            WHERE branch_id = $1 AND worker_id = $2 AND shift_date = $3
              AND status <> 'returned'
            FOR UPDATE
            "#,
        )
        .bind(branch_id)
        .bind(worker_id)
        .bind(shift_date)
        .fetch_optional(&mut **tx)
        .await?;

        match row {
            Some(row) => {
                let record_id = row.id;
                let lines = sqlx::query_as::<_, LedgerLineRow>(
                    "SELECT stock_item_id, name, unit, issued, used, returned
                     FROM shift_ledger_lines WHERE record_id = $1 ORDER BY name",
                )
                .bind(record_id)
                .fetch_all(&mut **tx)
                .await?;
                Ok(Some(row.into_model(lines)?))
            }
            None => Ok(None),
        }
    }

    pub(crate) async fn insert_record(
        tx: &mut Transaction<'_, Postgres>,
        record: &ShiftLedgerRecord,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO shift_ledgers (id, worker_id, branch_id, shift_date, status, issued_by, returned_at, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.worker_id)
        .bind(record.branch_id)
        .bind(record.shift_date)
        .bind(record.status.as_str())
        .bind(record.issued_by)
        .bind(record.returned_at)
        .bind(&record.notes)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Write back a mutated record: the header row plus an upsert of
    /// every line. Line counts are small (a shift issuance), so per-line
    /// statements are fine.
    pub(crate) async fn persist_record(
        tx: &mut Transaction<'_, Postgres>,
        record: &ShiftLedgerRecord,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE shift_ledgers
            SET status = $1, issued_by = $2, returned_at = $3, notes = $4
            WHERE id = $5
            "#,
        )
        .bind(record.status.as_str())
        .bind(record.issued_by)
        .bind(record.returned_at)
        .bind(&record.notes)
        .bind(record.id)
        .execute(&mut **tx)
        .await?;

        for line in &record.lines {
            sqlx::query(
                r#"
                INSERT INTO shift_ledger_lines (record_id, stock_item_id, name, unit, issued, used, returned)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (record_id, stock_item_id)
                DO UPDATE SET issued = $5, used = $6, returned = $7
                "#,
            )
            .bind(record.id)
            .bind(line.stock_item_id)
            .bind(&line.name)
            .bind(&line.unit)
            .bind(line.issued)
            .bind(line.used)
            .bind(line.returned)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
