//! Order aggregate and the order-status state machine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order lifecycle status.
///
/// Dine-in and takeaway orders run `pending -> accepted -> preparing ->
/// ready -> completed`. Delivery orders continue `ready ->
/// out_for_delivery -> returned -> completed`, where `returned` means
/// the rider is back with the cash and a cashier still has to verify
/// payment before completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Preparing,
    Ready,
    OutForDelivery,
    Delivered,
    Returned,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Returned => "returned",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "accepted" => Some(OrderStatus::Accepted),
            "preparing" => Some(OrderStatus::Preparing),
            "ready" => Some(OrderStatus::Ready),
            "out_for_delivery" => Some(OrderStatus::OutForDelivery),
            "delivered" => Some(OrderStatus::Delivered),
            "returned" => Some(OrderStatus::Returned),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Cancellation is only allowed before the order leaves the kitchen
    /// pipeline. Cancelling at `ready` is permitted even though stock
    /// has already been deducted; no reversal happens.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::Accepted
                | OrderStatus::Preparing
                | OrderStatus::Ready
        )
    }

    /// Whether `next` is a legal transition from this status for the
    /// given order type.
    pub fn can_transition_to(&self, next: OrderStatus, order_type: OrderType) -> bool {
        use OrderStatus::*;
        if next == Cancelled {
            return self.is_cancellable();
        }
        match (self, next) {
            (Pending, Accepted) => true,
            (Accepted, Preparing) => true,
            (Preparing, Ready) => true,
            (Ready, OutForDelivery) => order_type == OrderType::Delivery,
            (Ready, Delivered) => order_type != OrderType::Delivery,
            (Ready, Completed) => order_type != OrderType::Delivery,
            (OutForDelivery, Returned) => order_type == OrderType::Delivery,
            (Returned, Completed) => true,
            (Delivered, Completed) => true,
            _ => false,
        }
    }
}

/// Order service channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    DineIn,
    Delivery,
    Takeaway,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::DineIn => "dine_in",
            OrderType::Delivery => "delivery",
            OrderType::Takeaway => "takeaway",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "dine_in" => Some(OrderType::DineIn),
            "delivery" => Some(OrderType::Delivery),
            "takeaway" => Some(OrderType::Takeaway),
            _ => None,
        }
    }
}

/// A single ingredient requirement captured from the catalog when the
/// order was placed: quantity of a stock item per one unit of the line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngredientRequirement {
    pub stock_item_id: Uuid,
    pub quantity_per_unit: Decimal,
    pub unit: Option<String>,
}

/// An order line. The variant decides how stock deduction resolves:
/// cold drinks decrement their own variant stock item directly, while
/// products and deals carry the ingredient list captured at order time
/// (for deals, already scaled by each constituent's per-deal quantity).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderLineItem {
    Product {
        product_id: Uuid,
        name: String,
        size: String,
        quantity: Decimal,
        unit_price: Decimal,
        ingredients: Vec<IngredientRequirement>,
    },
    Deal {
        deal_id: Uuid,
        name: String,
        quantity: Decimal,
        unit_price: Decimal,
        ingredients: Vec<IngredientRequirement>,
    },
    ColdDrink {
        stock_item_id: Uuid,
        name: String,
        size: String,
        quantity: Decimal,
        unit_price: Decimal,
    },
}

impl OrderLineItem {
    pub fn quantity(&self) -> Decimal {
        match self {
            OrderLineItem::Product { quantity, .. }
            | OrderLineItem::Deal { quantity, .. }
            | OrderLineItem::ColdDrink { quantity, .. } => *quantity,
        }
    }

    pub fn unit_price(&self) -> Decimal {
        match self {
            OrderLineItem::Product { unit_price, .. }
            | OrderLineItem::Deal { unit_price, .. }
            | OrderLineItem::ColdDrink { unit_price, .. } => *unit_price,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            OrderLineItem::Product { name, .. }
            | OrderLineItem::Deal { name, .. }
            | OrderLineItem::ColdDrink { name, .. } => name,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.quantity() * self.unit_price()
    }

    /// Resolve this line to a uniform `(stock_item_id, quantity)` demand
    /// list, scaled by the ordered quantity.
    pub fn ingredient_demand(&self) -> Vec<(Uuid, Decimal)> {
        match self {
            OrderLineItem::ColdDrink {
                stock_item_id,
                quantity,
                ..
            } => vec![(*stock_item_id, *quantity)],
            OrderLineItem::Product {
                ingredients,
                quantity,
                ..
            }
            | OrderLineItem::Deal {
                ingredients,
                quantity,
                ..
            } => ingredients
                .iter()
                .map(|ing| (ing.stock_item_id, ing.quantity_per_unit * *quantity))
                .collect(),
        }
    }
}

/// The order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub branch_id: Uuid,
    pub order_type: OrderType,
    pub table_number: Option<i32>,
    pub floor: Option<String>,
    pub items: Vec<OrderLineItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    /// Set to true exactly once, when the ready transition has run the
    /// deduction engine. Guards against double deduction on retried
    /// status writes; must be persisted in the same write as the status.
    pub stock_deducted: bool,
    pub waiter_id: Option<Uuid>,
    pub chef_id: Option<Uuid>,
    pub delivery_worker_id: Option<Uuid>,
    pub cashier_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub additional_delay_minutes: i32,
    pub start_meter_reading: Option<Decimal>,
    pub end_meter_reading: Option<Decimal>,
    pub distance_travelled: Option<Decimal>,
    pub cash_received: Option<Decimal>,
    pub notes: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub preparing_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub departed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Sum of line totals.
    pub fn compute_subtotal(items: &[OrderLineItem]) -> Decimal {
        items.iter().map(|i| i.line_total()).sum()
    }

    /// Whoever placed the order gets the status notifications: the
    /// waiter for dine-in, the rider for delivery.
    pub fn notify_recipient(&self) -> Option<Uuid> {
        self.waiter_id.or(self.delivery_worker_id)
    }

    /// Record the timestamp for a transition that just happened.
    pub fn stamp_transition(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        match status {
            OrderStatus::Accepted => self.accepted_at = Some(at),
            OrderStatus::Preparing => self.preparing_at = Some(at),
            OrderStatus::Ready => self.ready_at = Some(at),
            OrderStatus::OutForDelivery => self.departed_at = Some(at),
            OrderStatus::Delivered => self.delivered_at = Some(at),
            OrderStatus::Completed => self.completed_at = Some(at),
            _ => {}
        }
    }
}
