//! Business logic services for the Restaurant Operations Platform

pub mod catalog;
pub mod notification;
pub mod order;
pub mod return_request;
pub mod shift_ledger;
pub mod stock;

pub use catalog::CatalogService;
pub use notification::NotificationService;
pub use order::OrderService;
pub use return_request::ReturnRequestService;
pub use shift_ledger::ShiftLedgerService;
pub use stock::StockService;
