//! Return-request workflow tests
//!
//! Tests for the submit/review cycle including:
//! - Strict validation at submission
//! - Clamped re-validation at approval
//! - Terminal request statuses

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use shared::models::{
    ReturnRequest, ReturnRequestLine, ReturnRequestStatus, ShiftLedgerRecord,
};

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn record_with_issue(item: Uuid, issued: Decimal) -> ShiftLedgerRecord {
    let mut record = ShiftLedgerRecord::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
    );
    record.add_issue(item, "Flour", "kg", issued).unwrap();
    record
}

fn line(item: Uuid, qty: Decimal) -> ReturnRequestLine {
    ReturnRequestLine {
        stock_item_id: item,
        name: "Flour".to_string(),
        unit: "kg".to_string(),
        return_quantity: qty,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Submission validates against remaining, not issued
    #[test]
    fn test_submission_checks_remaining() {
        let item = Uuid::new_v4();
        let mut record = record_with_issue(item, dec("5"));
        record.record_usage(item, dec("2")).unwrap();

        let within = vec![line(item, dec("3"))];
        assert!(ReturnRequest::first_excessive_line(&within, &record).is_none());

        let over = vec![line(item, dec("3.1"))];
        let (bad, max) = ReturnRequest::first_excessive_line(&over, &record).unwrap();
        assert_eq!(bad.return_quantity, dec("3.1"));
        assert_eq!(max, dec("3"));
    }

    /// The first violating line is reported, not the last
    #[test]
    fn test_first_violation_wins() {
        let flour = Uuid::new_v4();
        let oil = Uuid::new_v4();
        let mut record = record_with_issue(flour, dec("5"));
        record.add_issue(oil, "Oil", "liter", dec("2")).unwrap();

        let lines = vec![line(flour, dec("6")), line(oil, dec("99"))];
        let (bad, _) = ReturnRequest::first_excessive_line(&lines, &record).unwrap();
        assert_eq!(bad.stock_item_id, flour);
    }

    /// Items never issued to the worker have zero returnable
    #[test]
    fn test_unknown_item_is_excessive() {
        let item = Uuid::new_v4();
        let record = record_with_issue(item, dec("5"));

        let lines = vec![line(Uuid::new_v4(), dec("0.1"))];
        let (_, max) = ReturnRequest::first_excessive_line(&lines, &record).unwrap();
        assert_eq!(max, Decimal::ZERO);
    }

    /// Approval-time drift: usage recorded after submission shrinks what
    /// an approved return actually credits
    #[test]
    fn test_approval_clamps_after_drift() {
        let item = Uuid::new_v4();
        let mut record = record_with_issue(item, dec("5"));

        // submitted for 4 while 4 was returnable
        let requested = dec("4");
        assert!(ReturnRequest::first_excessive_line(
            &[line(item, requested)],
            &record
        )
        .is_none());

        // a late order burns 3 before review
        record.record_usage(item, dec("3")).unwrap();

        let actual = record.apply_return(item, requested, Utc::now());
        assert_eq!(actual, dec("2"));
        let l = record.line(item).unwrap();
        assert_eq!(l.used + l.returned, l.issued);
    }

    #[test]
    fn test_request_status_terminality() {
        assert!(!ReturnRequestStatus::Pending.is_terminal());
        assert!(ReturnRequestStatus::Approved.is_terminal());
        assert!(ReturnRequestStatus::Rejected.is_terminal());
        assert_eq!(
            ReturnRequestStatus::from_str("approved"),
            Some(ReturnRequestStatus::Approved)
        );
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// first_excessive_line agrees with a direct check of every line
    #[test]
    fn prop_excessive_detection_is_consistent(
        issued in 1u32..100,
        used in 0u32..100,
        requested in 0u32..200,
    ) {
        let item = Uuid::new_v4();
        let mut record = record_with_issue(item, Decimal::from(issued));
        let _ = record.record_usage(item, Decimal::from(used));

        let lines = vec![line(item, Decimal::from(requested))];
        let flagged = ReturnRequest::first_excessive_line(&lines, &record).is_some();
        let over = Decimal::from(requested) > record.max_returnable(item);
        prop_assert_eq!(flagged, over);
    }

    /// Whatever passes submission-time validation can be fully applied
    /// immediately with no clamping
    #[test]
    fn prop_valid_submission_applies_in_full(
        issued in 1u32..100,
        used in 0u32..100,
        requested in 0u32..100,
    ) {
        let item = Uuid::new_v4();
        let mut record = record_with_issue(item, Decimal::from(issued));
        let _ = record.record_usage(item, Decimal::from(used));

        let requested = Decimal::from(requested);
        let lines = vec![line(item, requested)];
        if ReturnRequest::first_excessive_line(&lines, &record).is_none() && requested > Decimal::ZERO {
            let actual = record.apply_return(item, requested, Utc::now());
            prop_assert_eq!(actual, requested);
        }
    }
}
