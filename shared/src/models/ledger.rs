//! Per-worker, per-shift issuance ledger
//!
//! Tracks what was handed out to a kitchen worker for a shift, how much
//! was consumed, and how much came back. The conservation invariant
//! `used + returned <= issued` holds for every line at all times.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::validation::{clamp_non_negative, clamp_to_max};

/// Errors raised by direct ledger mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("usage exceeds issued quantity for {item}")]
    UsageExceedsIssued { item: String },

    #[error("ledger record is already fully returned")]
    RecordClosed,

    #[error("item not found in ledger record")]
    LineNotFound,
}

/// Ledger record status. Monotonic: once `Returned`, the record rejects
/// all further mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Active,
    PartialReturn,
    Returned,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerStatus::Active => "active",
            LedgerStatus::PartialReturn => "partial_return",
            LedgerStatus::Returned => "returned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(LedgerStatus::Active),
            "partial_return" => Some(LedgerStatus::PartialReturn),
            "returned" => Some(LedgerStatus::Returned),
            _ => None,
        }
    }
}

/// One issued item within a shift record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerLine {
    pub stock_item_id: Uuid,
    pub name: String,
    pub unit: String,
    pub issued: Decimal,
    pub used: Decimal,
    pub returned: Decimal,
}

impl LedgerLine {
    pub fn new(stock_item_id: Uuid, name: String, unit: String, issued: Decimal) -> Self {
        Self {
            stock_item_id,
            name,
            unit,
            issued,
            used: Decimal::ZERO,
            returned: Decimal::ZERO,
        }
    }

    /// Issued minus used minus returned, floored at zero.
    pub fn remaining(&self) -> Decimal {
        clamp_non_negative(self.issued - self.used - self.returned)
    }

    /// A line is fully accounted when usage plus returns cover issuance.
    pub fn is_settled(&self) -> bool {
        self.used + self.returned >= self.issued
    }

    fn has_any_accounting(&self) -> bool {
        self.used > Decimal::ZERO || self.returned > Decimal::ZERO
    }
}

/// One record per worker per shift-day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftLedgerRecord {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub branch_id: Uuid,
    pub shift_date: NaiveDate,
    pub status: LedgerStatus,
    pub lines: Vec<LedgerLine>,
    pub issued_by: Option<Uuid>,
    pub returned_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl ShiftLedgerRecord {
    pub fn new(worker_id: Uuid, branch_id: Uuid, shift_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            worker_id,
            branch_id,
            shift_date,
            status: LedgerStatus::Active,
            lines: Vec::new(),
            issued_by: None,
            returned_at: None,
            notes: None,
        }
    }

    pub fn line(&self, stock_item_id: Uuid) -> Option<&LedgerLine> {
        self.lines.iter().find(|l| l.stock_item_id == stock_item_id)
    }

    fn line_mut(&mut self, stock_item_id: Uuid) -> Option<&mut LedgerLine> {
        self.lines
            .iter_mut()
            .find(|l| l.stock_item_id == stock_item_id)
    }

    fn ensure_open(&self) -> Result<(), LedgerError> {
        if self.status == LedgerStatus::Returned {
            return Err(LedgerError::RecordClosed);
        }
        Ok(())
    }

    /// Upsert an issuance: accumulate onto an existing line for the item
    /// or append a fresh one.
    pub fn add_issue(
        &mut self,
        stock_item_id: Uuid,
        name: &str,
        unit: &str,
        quantity: Decimal,
    ) -> Result<(), LedgerError> {
        self.ensure_open()?;
        match self.line_mut(stock_item_id) {
            Some(line) => line.issued += quantity,
            None => self.lines.push(LedgerLine::new(
                stock_item_id,
                name.to_string(),
                unit.to_string(),
                quantity,
            )),
        }
        self.recompute_status();
        Ok(())
    }

    /// Strict usage recording for direct calls: rejects when the delta
    /// would break conservation.
    pub fn record_usage(&mut self, stock_item_id: Uuid, delta: Decimal) -> Result<(), LedgerError> {
        self.ensure_open()?;
        let line = self
            .line_mut(stock_item_id)
            .ok_or(LedgerError::LineNotFound)?;
        if line.used + delta + line.returned > line.issued {
            return Err(LedgerError::UsageExceedsIssued {
                item: line.name.clone(),
            });
        }
        line.used += delta;
        self.recompute_status();
        Ok(())
    }

    /// Clamped usage attribution used by the deduction engine: usage is
    /// never recorded past what the worker still holds, so conservation
    /// survives attribution after a partial return. Missing lines are a
    /// silent no-op. Returns the quantity actually attributed.
    pub fn attribute_usage(&mut self, stock_item_id: Uuid, delta: Decimal) -> Decimal {
        if self.status == LedgerStatus::Returned {
            return Decimal::ZERO;
        }
        let Some(line) = self.line_mut(stock_item_id) else {
            return Decimal::ZERO;
        };
        let before = line.used;
        // returned quantities are back in the warehouse and no longer
        // the worker's to use
        let cap = clamp_non_negative(line.issued - line.returned);
        line.used = clamp_to_max(line.used + delta, cap);
        let attributed = line.used - before;
        self.recompute_status();
        attributed
    }

    /// Clamped return: the actual returned amount is
    /// `min(requested, issued - used - returned)`, never an error on
    /// over-request. Returns the clamped amount (zero when nothing is
    /// returnable or the record is closed).
    pub fn apply_return(
        &mut self,
        stock_item_id: Uuid,
        requested: Decimal,
        at: DateTime<Utc>,
    ) -> Decimal {
        if self.status == LedgerStatus::Returned {
            return Decimal::ZERO;
        }
        let Some(line) = self.line_mut(stock_item_id) else {
            return Decimal::ZERO;
        };
        let max_returnable = line.remaining();
        let actual = clamp_to_max(requested, max_returnable);
        if actual <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        line.returned += actual;
        self.returned_at = Some(at);
        self.recompute_status();
        actual
    }

    /// The maximum quantity currently returnable for an item.
    pub fn max_returnable(&self, stock_item_id: Uuid) -> Decimal {
        self.line(stock_item_id)
            .map(|l| l.remaining())
            .unwrap_or(Decimal::ZERO)
    }

    /// Derive the record status from its lines: `Returned` when every
    /// line is settled, `PartialReturn` when any line has accounting,
    /// otherwise `Active`. Never reopens a `Returned` record.
    pub fn recompute_status(&mut self) {
        if self.status == LedgerStatus::Returned {
            return;
        }
        if !self.lines.is_empty() && self.lines.iter().all(|l| l.is_settled()) {
            self.status = LedgerStatus::Returned;
        } else if self.lines.iter().any(|l| l.has_any_accounting()) {
            self.status = LedgerStatus::PartialReturn;
        } else {
            self.status = LedgerStatus::Active;
        }
    }
}
