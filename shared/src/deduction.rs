//! Stock deduction engine
//!
//! Runs when an order first transitions to `ready`: resolves each line
//! to its stock demands, decrements the warehouse items with the floor
//! clamp, and attributes usage to the cooking worker's active shift
//! ledger when one exists.
//!
//! Failures are collected per line into a [`DeductionReport`] instead of
//! aborting the loop; the order transition itself must not be blocked by
//! inventory bookkeeping. Callers decide whether to surface the report
//! or just log it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{OrderLineItem, ShiftLedgerRecord, StockItem};

/// A per-demand failure. Non-fatal: recorded in the report while the
/// remaining demands still run.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeductionFailure {
    #[error("stock item {stock_item_id} not found")]
    StockItemNotFound { stock_item_id: Uuid },

    #[error("stock item {stock_item_id} is inactive")]
    StockItemInactive { stock_item_id: Uuid },
}

/// Outcome of one `(stock item, quantity)` demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandOutcome {
    pub stock_item_id: Uuid,
    pub requested: Decimal,
    /// Actually removed from the warehouse; less than `requested` when
    /// the floor clamp engaged.
    pub deducted: Decimal,
    /// Portion recorded as the worker's usage on their shift ledger,
    /// capped at what was issued to them.
    pub attributed: Decimal,
    /// Effective unit cost of the item at deduction time; zero when the
    /// demand failed.
    pub unit_cost: Decimal,
    pub failure: Option<DeductionFailure>,
}

/// Outcome of one order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineReport {
    pub line_name: String,
    pub demands: Vec<DemandOutcome>,
}

/// Collected result of a full deduction pass over an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeductionReport {
    pub lines: Vec<LineReport>,
}

impl DeductionReport {
    pub fn failures(&self) -> impl Iterator<Item = &DeductionFailure> {
        self.lines
            .iter()
            .flat_map(|l| l.demands.iter())
            .filter_map(|d| d.failure.as_ref())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// True when any demand was short-supplied by the floor clamp.
    pub fn has_shortfalls(&self) -> bool {
        self.lines
            .iter()
            .flat_map(|l| l.demands.iter())
            .any(|d| d.failure.is_none() && d.deducted < d.requested)
    }

    /// Total value deducted, priced at each item's effective unit cost
    /// at deduction time.
    pub fn total_deducted_value(&self) -> Decimal {
        self.lines
            .iter()
            .flat_map(|l| l.demands.iter())
            .map(|d| d.deducted * d.unit_cost)
            .sum()
    }
}

/// Apply stock deduction for an order's lines.
///
/// `stock` holds the loaded items keyed by id; mutated entries are the
/// caller's to persist. `ledger` is the cooking worker's active shift
/// record for today, when one exists; usage attribution is a no-op
/// without it. This function must only run once per order: the caller
/// guards with the order's `stock_deducted` flag and flips it durably
/// in the same write as the status change.
pub fn run_deduction(
    items: &[OrderLineItem],
    stock: &mut HashMap<Uuid, StockItem>,
    mut ledger: Option<&mut ShiftLedgerRecord>,
    at: DateTime<Utc>,
) -> DeductionReport {
    let mut report = DeductionReport::default();

    for line in items {
        let mut demands = Vec::new();

        for (stock_item_id, quantity) in line.ingredient_demand() {
            let outcome = match stock.get_mut(&stock_item_id) {
                Some(item) if !item.is_active => DemandOutcome {
                    stock_item_id,
                    requested: quantity,
                    deducted: Decimal::ZERO,
                    attributed: Decimal::ZERO,
                    unit_cost: Decimal::ZERO,
                    failure: Some(DeductionFailure::StockItemInactive { stock_item_id }),
                },
                Some(item) => {
                    let unit_cost = item.effective_unit_cost();
                    let deducted = item.deduct(quantity, at);
                    // Cold drinks are not issued to workers; the ledger
                    // simply has no line for them and attribution no-ops.
                    let attributed = ledger
                        .as_deref_mut()
                        .map(|record| record.attribute_usage(stock_item_id, quantity))
                        .unwrap_or(Decimal::ZERO);
                    DemandOutcome {
                        stock_item_id,
                        requested: quantity,
                        deducted,
                        attributed,
                        unit_cost,
                        failure: None,
                    }
                }
                None => DemandOutcome {
                    stock_item_id,
                    requested: quantity,
                    deducted: Decimal::ZERO,
                    attributed: Decimal::ZERO,
                    unit_cost: Decimal::ZERO,
                    failure: Some(DeductionFailure::StockItemNotFound { stock_item_id }),
                },
            };
            demands.push(outcome);
        }

        report.lines.push(LineReport {
            line_name: line.name().to_string(),
            demands,
        });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IngredientRequirement, StockKind, StockUnit};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(name: &str, stock: &str) -> StockItem {
        StockItem {
            id: Uuid::new_v4(),
            branch_id: Uuid::new_v4(),
            name: name.to_string(),
            category: "Test".to_string(),
            kind: StockKind::Ingredient,
            unit: StockUnit::Kg,
            current_stock: dec(stock),
            minimum_stock: Decimal::ZERO,
            price_per_unit: dec("10"),
            average_cost: dec("10"),
            total_purchase_value: Decimal::ZERO,
            total_issue_value: Decimal::ZERO,
            is_active: true,
            last_restocked: None,
            movements: Vec::new(),
        }
    }

    fn product_line(name: &str, qty: &str, ingredient: &StockItem, per_unit: &str) -> OrderLineItem {
        OrderLineItem::Product {
            product_id: Uuid::new_v4(),
            name: name.to_string(),
            size: "medium".to_string(),
            quantity: dec(qty),
            unit_price: dec("100"),
            ingredients: vec![IngredientRequirement {
                stock_item_id: ingredient.id,
                quantity_per_unit: dec(per_unit),
                unit: Some("kg".to_string()),
            }],
        }
    }

    #[test]
    fn test_product_line_deducts_scaled_ingredients() {
        let flour = item("Flour", "10");
        let flour_id = flour.id;
        let mut stock: HashMap<_, _> = [(flour.id, flour)].into();
        let lines = vec![product_line("Naan", "3", &stock[&flour_id], "0.2")];

        let report = run_deduction(&lines, &mut stock, None, Utc::now());

        assert_eq!(stock[&flour_id].current_stock, dec("9.4"));
        assert!(!report.has_failures());
        assert!(!report.has_shortfalls());
        assert_eq!(report.lines[0].demands[0].deducted, dec("0.6"));
    }

    #[test]
    fn test_cold_drink_clamps_at_zero_without_failure() {
        let mut pepsi = item("Pepsi 500ml", "0");
        pepsi.kind = StockKind::ColdDrink;
        pepsi.unit = StockUnit::Pieces;
        let pepsi_id = pepsi.id;
        let mut stock: HashMap<_, _> = [(pepsi.id, pepsi)].into();
        let lines = vec![OrderLineItem::ColdDrink {
            stock_item_id: pepsi_id,
            name: "Pepsi".to_string(),
            size: "500ml".to_string(),
            quantity: dec("2"),
            unit_price: dec("80"),
        }];

        let report = run_deduction(&lines, &mut stock, None, Utc::now());

        assert_eq!(stock[&pepsi_id].current_stock, Decimal::ZERO);
        assert!(!report.has_failures());
        assert!(report.has_shortfalls());
        assert_eq!(report.lines[0].demands[0].deducted, Decimal::ZERO);
    }

    #[test]
    fn test_usage_attribution_caps_at_issued() {
        let flour = item("Flour", "100");
        let flour_id = flour.id;
        let worker = Uuid::new_v4();
        let mut record = ShiftLedgerRecord::new(
            worker,
            Uuid::new_v4(),
            chrono::NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        );
        record.add_issue(flour_id, "Flour", "kg", dec("5")).unwrap();

        let mut stock: HashMap<_, _> = [(flour.id, flour)].into();
        let lines = vec![product_line("Naan", "3", &stock[&flour_id], "0.2")];
        let report = run_deduction(&lines, &mut stock, Some(&mut record), Utc::now());

        let line = record.line(flour_id).unwrap();
        assert_eq!(line.used, dec("0.6"));
        assert_eq!(line.remaining(), dec("4.4"));
        assert_eq!(report.lines[0].demands[0].attributed, dec("0.6"));

        // a demand far beyond issuance still deducts warehouse stock but
        // attribution stops at the issued quantity
        let big = vec![product_line("Biryani", "100", &stock[&flour_id], "0.2")];
        run_deduction(&big, &mut stock, Some(&mut record), Utc::now());
        assert_eq!(record.line(flour_id).unwrap().used, dec("5"));
    }

    #[test]
    fn test_deducted_value_priced_at_unit_cost() {
        let flour = item("Flour", "10");
        let flour_id = flour.id;
        let mut stock: HashMap<_, _> = [(flour.id, flour)].into();
        let lines = vec![product_line("Naan", "3", &stock[&flour_id], "0.2")];

        let report = run_deduction(&lines, &mut stock, None, Utc::now());

        // 0.6 kg at the item's effective unit cost of 10
        assert_eq!(report.lines[0].demands[0].unit_cost, dec("10"));
        assert_eq!(report.total_deducted_value(), dec("6"));
    }

    #[test]
    fn test_failed_demand_contributes_no_value() {
        let flour = item("Flour", "10");
        let flour_id = flour.id;
        let mut stock: HashMap<_, _> = [(flour.id, flour)].into();

        let missing = OrderLineItem::ColdDrink {
            stock_item_id: Uuid::new_v4(),
            name: "Ghost Drink".to_string(),
            size: "1L".to_string(),
            quantity: dec("1"),
            unit_price: dec("50"),
        };
        let lines = vec![missing, product_line("Naan", "1", &stock[&flour_id], "0.2")];

        let report = run_deduction(&lines, &mut stock, None, Utc::now());

        assert_eq!(report.total_deducted_value(), dec("2"));
    }

    #[test]
    fn test_missing_item_is_per_line_failure_not_fatal() {
        let flour = item("Flour", "10");
        let flour_id = flour.id;
        let mut stock: HashMap<_, _> = [(flour.id, flour)].into();

        let missing = OrderLineItem::ColdDrink {
            stock_item_id: Uuid::new_v4(),
            name: "Ghost Drink".to_string(),
            size: "1L".to_string(),
            quantity: dec("1"),
            unit_price: dec("50"),
        };
        let lines = vec![missing, product_line("Naan", "1", &stock[&flour_id], "0.2")];

        let report = run_deduction(&lines, &mut stock, None, Utc::now());

        assert!(report.has_failures());
        assert_eq!(report.failures().count(), 1);
        // the later line still ran
        assert_eq!(stock[&flour_id].current_stock, dec("9.8"));
    }

    #[test]
    fn test_deal_line_uses_prescaled_ingredients() {
        let flour = item("Flour", "10");
        let oil = item("Oil", "4");
        let (flour_id, oil_id) = (flour.id, oil.id);
        let mut stock: HashMap<_, _> = [(flour.id, flour), (oil.id, oil)].into();

        // family deal: 2 naan (0.2 kg flour each) + 1 karahi (0.25 l oil)
        let deal = OrderLineItem::Deal {
            deal_id: Uuid::new_v4(),
            name: "Family Deal".to_string(),
            quantity: dec("2"),
            unit_price: dec("1200"),
            ingredients: vec![
                IngredientRequirement {
                    stock_item_id: flour_id,
                    quantity_per_unit: dec("0.4"),
                    unit: Some("kg".to_string()),
                },
                IngredientRequirement {
                    stock_item_id: oil_id,
                    quantity_per_unit: dec("0.25"),
                    unit: Some("liter".to_string()),
                },
            ],
        };

        run_deduction(&[deal], &mut stock, None, Utc::now());

        assert_eq!(stock[&flour_id].current_stock, dec("9.2"));
        assert_eq!(stock[&oil_id].current_stock, dec("3.5"));
    }
}
