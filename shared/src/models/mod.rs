//! Domain models for the Restaurant Operations Platform

mod ledger;
mod order;
mod return_request;
mod stock;

pub use ledger::*;
pub use order::*;
pub use return_request::*;
pub use stock::*;
