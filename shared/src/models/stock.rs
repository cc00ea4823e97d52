//! Warehouse stock items and the movement audit trail

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::clamp_non_negative;

/// Unit of measure for a stock item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockUnit {
    Kg,
    HalfKg,
    QuarterKg,
    Liter,
    HalfLiter,
    Pieces,
    Grams,
}

impl StockUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockUnit::Kg => "kg",
            StockUnit::HalfKg => "half_kg",
            StockUnit::QuarterKg => "quarter_kg",
            StockUnit::Liter => "liter",
            StockUnit::HalfLiter => "half_liter",
            StockUnit::Pieces => "pieces",
            StockUnit::Grams => "grams",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "kg" => Some(StockUnit::Kg),
            "half_kg" => Some(StockUnit::HalfKg),
            "quarter_kg" => Some(StockUnit::QuarterKg),
            "liter" => Some(StockUnit::Liter),
            "half_liter" => Some(StockUnit::HalfLiter),
            "pieces" => Some(StockUnit::Pieces),
            "grams" => Some(StockUnit::Grams),
            _ => None,
        }
    }
}

/// What kind of stock a row tracks: a warehouse ingredient or a
/// cold-drink size variant (e.g. "Pepsi 500ml"), which is sold as-is
/// and has no ingredient resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockKind {
    Ingredient,
    ColdDrink,
}

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementDirection {
    In,
    Out,
}

impl MovementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementDirection::In => "in",
            MovementDirection::Out => "out",
        }
    }
}

/// Audit entry appended on every stock mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub date: DateTime<Utc>,
    pub quantity: Decimal,
    pub direction: MovementDirection,
}

/// A warehouse-tracked stock item.
///
/// Quantities never go negative: decrements are floor-clamped rather
/// than rejected, so an over-deducting order still flows while the
/// ledger under-reports at worst.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockItem {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub name: String,
    pub category: String,
    pub kind: StockKind,
    pub unit: StockUnit,
    pub current_stock: Decimal,
    pub minimum_stock: Decimal,
    pub price_per_unit: Decimal,
    /// Weighted average cost, recomputed on every purchase as
    /// `total_purchase_value / current_stock`.
    pub average_cost: Decimal,
    pub total_purchase_value: Decimal,
    pub total_issue_value: Decimal,
    pub is_active: bool,
    pub last_restocked: Option<DateTime<Utc>>,
    pub movements: Vec<StockMovement>,
}

impl StockItem {
    /// Record a purchase: increment stock, accumulate purchase value,
    /// recompute the weighted average cost.
    pub fn record_purchase(&mut self, quantity: Decimal, unit_cost: Decimal, at: DateTime<Utc>) {
        let total_cost = quantity * unit_cost;
        self.current_stock += quantity;
        self.total_purchase_value += total_cost;
        self.last_restocked = Some(at);
        self.recalculate_average_cost();
        self.movements.push(StockMovement {
            date: at,
            quantity,
            direction: MovementDirection::In,
        });
    }

    /// Decrement stock, floor-clamped at zero. Returns the quantity
    /// actually removed, which may be less than requested when the item
    /// is short. Accrues the issue value at the effective unit cost.
    pub fn deduct(&mut self, quantity: Decimal, at: DateTime<Utc>) -> Decimal {
        let before = self.current_stock;
        self.current_stock = clamp_non_negative(self.current_stock - quantity);
        let deducted = before - self.current_stock;
        self.total_issue_value += quantity * self.effective_unit_cost();
        self.movements.push(StockMovement {
            date: at,
            quantity,
            direction: MovementDirection::Out,
        });
        deducted
    }

    /// Credit stock back, e.g. from a shift return.
    pub fn restock(&mut self, quantity: Decimal, at: DateTime<Utc>) {
        self.current_stock += quantity;
        self.movements.push(StockMovement {
            date: at,
            quantity,
            direction: MovementDirection::In,
        });
    }

    /// Unit cost used for issue valuation: average cost when known,
    /// otherwise the listed price per unit.
    pub fn effective_unit_cost(&self) -> Decimal {
        if self.average_cost > Decimal::ZERO {
            self.average_cost
        } else {
            self.price_per_unit
        }
    }

    pub fn recalculate_average_cost(&mut self) -> Decimal {
        if self.current_stock > Decimal::ZERO && self.total_purchase_value > Decimal::ZERO {
            self.average_cost = self.total_purchase_value / self.current_stock;
        }
        self.average_cost
    }

    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.minimum_stock
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.current_stock == Decimal::ZERO
    }

    /// Current valuation of the on-hand quantity.
    pub fn stock_value(&self) -> Decimal {
        self.current_stock * self.effective_unit_cost()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn flour() -> StockItem {
        StockItem {
            id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            name: "Flour".to_string(),
            category: "Dry Goods".to_string(),
            kind: StockKind::Ingredient,
            unit: StockUnit::Kg,
            current_stock: Decimal::ZERO,
            minimum_stock: dec("2"),
            price_per_unit: dec("100"),
            average_cost: Decimal::ZERO,
            total_purchase_value: Decimal::ZERO,
            total_issue_value: Decimal::ZERO,
            is_active: true,
            last_restocked: None,
            movements: Vec::new(),
        }
    }

    #[test]
    fn test_purchase_updates_average_cost() {
        let mut item = flour();
        let now = Utc::now();
        item.record_purchase(dec("100"), dec("20"), now);
        item.record_purchase(dec("50"), dec("30"), now);
        // 3500 value over 150 kg
        assert_eq!(item.current_stock, dec("150"));
        assert_eq!(item.total_purchase_value, dec("3500"));
        assert!(item.average_cost > dec("23") && item.average_cost < dec("24"));
        assert_eq!(item.movements.len(), 2);
    }

    #[test]
    fn test_deduct_clamps_at_zero() {
        let mut item = flour();
        let now = Utc::now();
        item.record_purchase(dec("5"), dec("10"), now);
        let removed = item.deduct(dec("8"), now);
        assert_eq!(removed, dec("5"));
        assert_eq!(item.current_stock, Decimal::ZERO);
    }

    #[test]
    fn test_deduct_returns_requested_when_available() {
        let mut item = flour();
        let now = Utc::now();
        item.record_purchase(dec("10"), dec("10"), now);
        let removed = item.deduct(dec("0.6"), now);
        assert_eq!(removed, dec("0.6"));
        assert_eq!(item.current_stock, dec("9.4"));
    }

    #[test]
    fn test_restock_appends_in_movement() {
        let mut item = flour();
        let now = Utc::now();
        item.restock(dec("4.4"), now);
        assert_eq!(item.current_stock, dec("4.4"));
        assert_eq!(item.movements.last().unwrap().direction, MovementDirection::In);
    }

    #[test]
    fn test_low_stock_flag() {
        let mut item = flour();
        item.current_stock = dec("2");
        assert!(item.is_low_stock());
        item.current_stock = dec("2.1");
        assert!(!item.is_low_stock());
    }

    #[test]
    fn test_effective_unit_cost_falls_back_to_price() {
        let item = flour();
        assert_eq!(item.effective_unit_cost(), dec("100"));
    }
}
