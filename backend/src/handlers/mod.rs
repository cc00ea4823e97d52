//! HTTP handlers for the Restaurant Operations Platform

pub mod health;
pub mod notification;
pub mod order;
pub mod return_request;
pub mod shift_ledger;
pub mod stock;

pub use health::*;
pub use notification::*;
pub use order::*;
pub use return_request::*;
pub use shift_ledger::*;
pub use stock::*;
