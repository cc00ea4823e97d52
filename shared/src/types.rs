//! Common types used across the platform

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A shift day: the half-open window `[midnight, next midnight)` used to
/// find or create a worker's active issuance ledger record.
///
/// Centralized so every ledger lookup resolves the boundary the same
/// way and tests can fix the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftWindow {
    pub date: NaiveDate,
}

impl ShiftWindow {
    /// The shift window containing the given instant.
    pub fn containing<Tz: TimeZone>(at: DateTime<Tz>) -> Self {
        Self {
            date: at.date_naive(),
        }
    }

    /// Window start, inclusive (midnight UTC of the shift date).
    pub fn start(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.date.and_hms_opt(0, 0, 0).unwrap())
    }

    /// Window end, exclusive (next midnight).
    pub fn end(&self) -> DateTime<Utc> {
        self.start() + Duration::days(1)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start() && at < self.end()
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

/// Date range for queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_shift_window_contains_its_instant() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap();
        let window = ShiftWindow::containing(at);
        assert!(window.contains(at));
        assert_eq!(window.date, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
    }

    #[test]
    fn test_shift_window_boundaries() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
        let window = ShiftWindow::containing(at);
        assert!(window.contains(window.start()));
        assert!(!window.contains(window.end()));
        assert_eq!(window.end() - window.start(), Duration::days(1));
    }

    #[test]
    fn test_adjacent_shift_windows_do_not_overlap() {
        let morning = Utc.with_ymd_and_hms(2025, 3, 14, 8, 0, 0).unwrap();
        let next_day = morning + Duration::days(1);
        let today = ShiftWindow::containing(morning);
        let tomorrow = ShiftWindow::containing(next_day);
        assert_eq!(today.end(), tomorrow.start());
        assert!(!today.contains(next_day));
    }
}
