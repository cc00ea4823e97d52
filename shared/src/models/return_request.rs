//! Return-request approval workflow models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ShiftLedgerRecord;

/// Return-request status: `pending -> {approved, rejected}`, terminal
/// either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReturnRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnRequestStatus::Pending => "pending",
            ReturnRequestStatus::Approved => "approved",
            ReturnRequestStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReturnRequestStatus::Pending),
            "approved" => Some(ReturnRequestStatus::Approved),
            "rejected" => Some(ReturnRequestStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != ReturnRequestStatus::Pending
    }
}

/// One requested return quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRequestLine {
    pub stock_item_id: Uuid,
    pub name: String,
    pub unit: String,
    pub return_quantity: Decimal,
}

/// A worker's request to hand unused shift stock back to the warehouse,
/// reviewed by an inventory officer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub id: Uuid,
    pub worker_id: Uuid,
    pub ledger_record_id: Uuid,
    pub branch_id: Uuid,
    pub items: Vec<ReturnRequestLine>,
    pub status: ReturnRequestStatus,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ReturnRequest {
    /// Validate requested quantities against the ledger's current
    /// remaining amounts. Returns the first violating line, if any.
    ///
    /// Applied at submission time; at approval time usage may have
    /// drifted, so approval clamps instead of re-rejecting.
    pub fn first_excessive_line<'a>(
        items: &'a [ReturnRequestLine],
        record: &ShiftLedgerRecord,
    ) -> Option<(&'a ReturnRequestLine, Decimal)> {
        items.iter().find_map(|line| {
            let max = record.max_returnable(line.stock_item_id);
            (line.return_quantity > max).then_some((line, max))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_excessive_line_detected() {
        let item = Uuid::new_v4();
        let mut record = ShiftLedgerRecord::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        );
        record.add_issue(item, "Flour", "kg", dec("5")).unwrap();
        record.record_usage(item, dec("2")).unwrap();

        let ok = vec![ReturnRequestLine {
            stock_item_id: item,
            name: "Flour".to_string(),
            unit: "kg".to_string(),
            return_quantity: dec("3"),
        }];
        assert!(ReturnRequest::first_excessive_line(&ok, &record).is_none());

        let over = vec![ReturnRequestLine {
            stock_item_id: item,
            name: "Flour".to_string(),
            unit: "kg".to_string(),
            return_quantity: dec("3.5"),
        }];
        let (line, max) = ReturnRequest::first_excessive_line(&over, &record).unwrap();
        assert_eq!(line.return_quantity, dec("3.5"));
        assert_eq!(max, dec("3"));
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ReturnRequestStatus::Pending.is_terminal());
        assert!(ReturnRequestStatus::Approved.is_terminal());
        assert!(ReturnRequestStatus::Rejected.is_terminal());
    }
}
