//! Validation and clamping utilities
//!
//! The stock ledger deliberately clamps instead of rejecting when a
//! decrement or return over-requests: inventory bookkeeping must never
//! block order flow. The clamp helpers are named and tested here rather
//! than scattered inline at call sites.

use rust_decimal::Decimal;

/// Clamp a computed quantity at zero.
///
/// Used for stock decrements and ledger `remaining` so no balance ever
/// goes negative, even when the request over-deducts.
pub fn clamp_non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

/// Clamp a quantity to an upper bound.
///
/// Used when attributing deduction usage to a worker's ledger line:
/// usage beyond what was issued stays on the shared stock ledger but is
/// never recorded against the worker.
pub fn clamp_to_max(value: Decimal, max: Decimal) -> Decimal {
    value.min(max)
}

/// Validate that a quantity is strictly positive.
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate that a unit cost is non-negative.
pub fn validate_unit_cost(cost: Decimal) -> Result<(), &'static str> {
    if cost < Decimal::ZERO {
        return Err("Unit cost cannot be negative");
    }
    Ok(())
}

/// Validate an order number format: `ORD-YYYYMMDD-NNNN`.
pub fn validate_order_number(number: &str) -> Result<(), &'static str> {
    let parts: Vec<&str> = number.split('-').collect();
    if parts.len() != 3 || parts[0] != "ORD" {
        return Err("Order number must look like ORD-YYYYMMDD-NNNN");
    }
    if parts[1].len() != 8 || !parts[1].chars().all(|c| c.is_ascii_digit()) {
        return Err("Order number date segment must be 8 digits");
    }
    if parts[2].is_empty() || !parts[2].chars().all(|c| c.is_ascii_digit()) {
        return Err("Order number sequence must be numeric");
    }
    Ok(())
}
