//! Order service: creation, the status state machine, and the stock
//! deduction that runs on the ready transition.
//!
//! All transition writes happen inside a single transaction with the
//! order row locked, so a retried request observes the already-updated
//! status (and the already-set `stock_deducted` flag) instead of running
//! side effects twice.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::deduction::{run_deduction, DeductionReport};
use shared::models::{Order, OrderLineItem, OrderStatus, OrderType};
use shared::types::ShiftWindow;
use shared::validation::clamp_non_negative;

use crate::config::{DeductionConfig, OrderConfig};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentWorker;
use crate::services::catalog::{CatalogService, NewOrderLine};
use crate::services::notification::NotificationService;
use crate::services::shift_ledger::ShiftLedgerService;
use crate::services::stock::StockService;

/// Order service
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
    catalog: CatalogService,
    notifications: NotificationService,
    order_config: OrderConfig,
    deduction_config: DeductionConfig,
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    branch_id: Uuid,
    order_type: String,
    table_number: Option<i32>,
    floor: Option<String>,
    items: sqlx::types::Json<Vec<OrderLineItem>>,
    subtotal: Decimal,
    tax: Decimal,
    discount: Decimal,
    total: Decimal,
    status: String,
    stock_deducted: bool,
    waiter_id: Option<Uuid>,
    chef_id: Option<Uuid>,
    delivery_worker_id: Option<Uuid>,
    cashier_id: Option<Uuid>,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    delivery_address: Option<String>,
    additional_delay_minutes: i32,
    start_meter_reading: Option<Decimal>,
    end_meter_reading: Option<Decimal>,
    distance_travelled: Option<Decimal>,
    cash_received: Option<Decimal>,
    notes: Option<String>,
    accepted_at: Option<chrono::DateTime<Utc>>,
    preparing_at: Option<chrono::DateTime<Utc>>,
    ready_at: Option<chrono::DateTime<Utc>>,
    departed_at: Option<chrono::DateTime<Utc>>,
    delivered_at: Option<chrono::DateTime<Utc>>,
    completed_at: Option<chrono::DateTime<Utc>>,
    created_at: chrono::DateTime<Utc>,
}

const ORDER_COLUMNS: &str = r#"
    id, order_number, branch_id, order_type, table_number, floor, items,
    subtotal, tax, discount, total, status, stock_deducted,
    waiter_id, chef_id, delivery_worker_id, cashier_id,
    customer_name, customer_phone, delivery_address, additional_delay_minutes,
    start_meter_reading, end_meter_reading, distance_travelled, cash_received,
    notes, accepted_at, preparing_at, ready_at, departed_at, delivered_at,
    completed_at, created_at
"#;

impl OrderRow {
    fn into_model(self) -> AppResult<Order> {
        let order_type = OrderType::from_str(&self.order_type)
            .ok_or_else(|| AppError::Internal(format!("unknown order type: {}", self.order_type)))?;
        let status = OrderStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("unknown order status: {}", self.status)))?;
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            branch_id: self.branch_id,
            order_type,
            table_number: self.table_number,
            floor: self.floor,
            items: self.items.0,
            subtotal: self.subtotal,
            tax: self.tax,
            discount: self.discount,
            total: self.total,
            status,
            stock_deducted: self.stock_deducted,
            waiter_id: self.waiter_id,
            chef_id: self.chef_id,
            delivery_worker_id: self.delivery_worker_id,
            cashier_id: self.cashier_id,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            delivery_address: self.delivery_address,
            additional_delay_minutes: self.additional_delay_minutes,
            start_meter_reading: self.start_meter_reading,
            end_meter_reading: self.end_meter_reading,
            distance_travelled: self.distance_travelled,
            cash_received: self.cash_received,
            notes: self.notes,
            accepted_at: self.accepted_at,
            preparing_at: self.preparing_at,
            ready_at: self.ready_at,
            departed_at: self.departed_at,
            delivered_at: self.delivered_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
        })
    }
}

/// Input for creating an order
#[derive(Debug, Deserialize)]
pub struct CreateOrderInput {
    pub order_type: OrderType,
    pub items: Vec<NewOrderLine>,
    pub table_number: Option<i32>,
    pub floor: Option<String>,
    pub discount: Option<Decimal>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
}

/// Input for a status transition. Meter and cash fields only apply to
/// the delivery legs.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusInput {
    pub status: OrderStatus,
    pub start_meter_reading: Option<Decimal>,
    pub end_meter_reading: Option<Decimal>,
    pub cash_received: Option<Decimal>,
}

/// Result of a status transition, with the deduction report when the
/// ready transition ran the engine.
#[derive(Debug, Serialize)]
pub struct TransitionOutcome {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deduction: Option<DeductionReport>,
}

/// Query filters for listing orders
#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub order_type: Option<OrderType>,
    pub date: Option<chrono::NaiveDate>,
}

impl OrderService {
    pub fn new(
        db: PgPool,
        catalog: CatalogService,
        notifications: NotificationService,
        order_config: OrderConfig,
        deduction_config: DeductionConfig,
    ) -> Self {
        Self {
            db,
            catalog,
            notifications,
            order_config,
            deduction_config,
        }
    }

    /// Create an order. Lines are resolved against the catalog so their
    /// prices and ingredient lists are frozen at this moment; totals are
    /// computed server-side.
    pub async fn create_order(
        &self,
        worker: &CurrentWorker,
        input: CreateOrderInput,
    ) -> AppResult<Order> {
        if input.order_type == OrderType::Delivery
            && input.delivery_address.as_deref().map_or(true, str::is_empty)
        {
            return Err(AppError::Validation {
                field: "delivery_address".to_string(),
                message: "Delivery orders require an address".to_string(),
            });
        }
        let discount = input.discount.unwrap_or(Decimal::ZERO);
        if discount < Decimal::ZERO {
            return Err(AppError::Validation {
                field: "discount".to_string(),
                message: "Discount cannot be negative".to_string(),
            });
        }

        let items = self
            .catalog
            .resolve_lines(worker.branch_id, &input.items)
            .await?;

        let subtotal = Order::compute_subtotal(&items);
        let tax = subtotal * Decimal::from(self.order_config.tax_rate_percent) / Decimal::from(100);
        let total = clamp_non_negative(subtotal + tax - discount);

        // dine-in and takeaway orders are placed by a waiter; delivery
        // orders by the rider who will carry them
        let (waiter_id, delivery_worker_id) = match input.order_type {
            OrderType::Delivery => (None, Some(worker.worker_id)),
            _ => (Some(worker.worker_id), None),
        };

        let mut tx = self.db.begin().await?;
        let order_number = Self::next_order_number(&mut tx, worker.branch_id).await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO orders (order_number, branch_id, order_type, table_number, floor, items,
                                subtotal, tax, discount, total, status,
                                waiter_id, delivery_worker_id,
                                customer_name, customer_phone, delivery_address, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending', $11, $12, $13, $14, $15, $16)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(&order_number)
        .bind(worker.branch_id)
        .bind(input.order_type.as_str())
        .bind(input.table_number)
        .bind(&input.floor)
        .bind(sqlx::types::Json(&items))
        .bind(subtotal)
        .bind(tax)
        .bind(discount)
        .bind(total)
        .bind(waiter_id)
        .bind(delivery_worker_id)
        .bind(&input.customer_name)
        .bind(&input.customer_phone)
        .bind(&input.delivery_address)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let order = row.into_model()?;
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "order created"
        );
        Ok(order)
    }

    /// A chef claims a pending order. Accepting is the only way an order
    /// gets a chef, and it only works from `pending`.
    pub async fn accept_order(&self, worker: &CurrentWorker, order_id: Uuid) -> AppResult<Order> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut order = Self::fetch_order_for_update(&mut tx, worker.branch_id, order_id).await?;

        if !order
            .status
            .can_transition_to(OrderStatus::Accepted, order.order_type)
        {
            return Err(AppError::InvalidTransition(format!(
                "{} -> accepted",
                order.status.as_str()
            )));
        }

        order.status = OrderStatus::Accepted;
        order.chef_id = Some(worker.worker_id);
        order.stamp_transition(OrderStatus::Accepted, now);
        Self::persist_order(&mut tx, &order).await?;
        tx.commit().await?;

        self.notifications
            .notify_order_status(&order, OrderStatus::Accepted)
            .await;
        Ok(order)
    }

    /// Drive the order through its state machine. The ready transition
    /// additionally runs stock deduction exactly once, guarded by the
    /// `stock_deducted` flag persisted in the same write as the status.
    pub async fn update_status(
        &self,
        worker: &CurrentWorker,
        order_id: Uuid,
        input: UpdateStatusInput,
    ) -> AppResult<TransitionOutcome> {
        let next = input.status;
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut order = Self::fetch_order_for_update(&mut tx, worker.branch_id, order_id).await?;

        if !order.status.can_transition_to(next, order.order_type) {
            return Err(AppError::InvalidTransition(format!(
                "{} -> {}",
                order.status.as_str(),
                next.as_str()
            )));
        }
        Self::authorize_transition(&order, worker, next)?;

        let mut deduction = None;
        match next {
            OrderStatus::Ready if !order.stock_deducted => {
                let report = self.deduct_stock(&mut tx, &order, now).await?;
                order.stock_deducted = true;
                deduction = Some(report);
            }
            OrderStatus::OutForDelivery => {
                order.start_meter_reading = input.start_meter_reading.or(order.start_meter_reading);
            }
            OrderStatus::Returned => {
                order.end_meter_reading = input.end_meter_reading.or(order.end_meter_reading);
                order.cash_received = input.cash_received.or(order.cash_received);
                if let (Some(start), Some(end)) =
                    (order.start_meter_reading, order.end_meter_reading)
                {
                    order.distance_travelled = Some(clamp_non_negative(end - start));
                }
            }
            OrderStatus::Completed => {
                order.cashier_id = Some(worker.worker_id);
            }
            _ => {}
        }

        order.status = next;
        order.stamp_transition(next, now);
        Self::persist_order(&mut tx, &order).await?;
        tx.commit().await?;

        self.notifications.notify_order_status(&order, next).await;
        Ok(TransitionOutcome { order, deduction })
    }

    /// Cancel an order within the cancellation window. Stock already
    /// deducted at `ready` is not re-credited; a cancelled-after-ready
    /// order was cooked and the ingredients are gone.
    pub async fn cancel_order(
        &self,
        worker: &CurrentWorker,
        order_id: Uuid,
        reason: Option<String>,
    ) -> AppResult<Order> {
        let mut tx = self.db.begin().await?;
        let mut order = Self::fetch_order_for_update(&mut tx, worker.branch_id, order_id).await?;

        if !order
            .status
            .can_transition_to(OrderStatus::Cancelled, order.order_type)
        {
            return Err(AppError::InvalidTransition(format!(
                "{} -> cancelled",
                order.status.as_str()
            )));
        }

        order.status = OrderStatus::Cancelled;
        if let Some(reason) = reason {
            order.notes = Some(match order.notes.take() {
                Some(notes) => format!("{}\nCancelled: {}", notes, reason),
                None => format!("Cancelled: {}", reason),
            });
        }
        Self::persist_order(&mut tx, &order).await?;
        tx.commit().await?;

        self.notifications
            .notify_order_status(&order, OrderStatus::Cancelled)
            .await;
        Ok(order)
    }

    /// The chef flags extra preparation time; delays accumulate rather
    /// than replace so repeated flags add up.
    pub async fn add_delay(
        &self,
        worker: &CurrentWorker,
        order_id: Uuid,
        minutes: i32,
    ) -> AppResult<Order> {
        if minutes <= 0 {
            return Err(AppError::Validation {
                field: "minutes".to_string(),
                message: "Delay must be a positive number of minutes".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;
        let mut order = Self::fetch_order_for_update(&mut tx, worker.branch_id, order_id).await?;

        if order.chef_id != Some(worker.worker_id) {
            return Err(AppError::NotAuthorized(
                "only the assigned chef can flag a delay".to_string(),
            ));
        }
        if !matches!(order.status, OrderStatus::Accepted | OrderStatus::Preparing) {
            return Err(AppError::InvalidTransition(format!(
                "cannot add delay while {}",
                order.status.as_str()
            )));
        }

        order.additional_delay_minutes += minutes;
        Self::persist_order(&mut tx, &order).await?;
        tx.commit().await?;

        let recipient = order.notify_recipient();
        tracing::info!(
            order_id = %order.id,
            total_delay = order.additional_delay_minutes,
            recipient = ?recipient,
            "delay added"
        );
        Ok(order)
    }

    /// Get a single order
    pub async fn get_order(&self, branch_id: Uuid, order_id: Uuid) -> AppResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND branch_id = $2"
        ))
        .bind(order_id)
        .bind(branch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
        row.into_model()
    }

    /// The kitchen queue: unclaimed pending orders, oldest first
    pub async fn pending_orders(&self, branch_id: Uuid) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE branch_id = $1 AND status = 'pending'
            ORDER BY created_at ASC
            "#
        ))
        .bind(branch_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(|r| r.into_model()).collect()
    }

    /// Orders a chef has claimed and not yet finished
    pub async fn active_orders_for_chef(
        &self,
        branch_id: Uuid,
        chef_id: Uuid,
    ) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE branch_id = $1 AND chef_id = $2 AND status IN ('accepted', 'preparing')
            ORDER BY accepted_at ASC
            "#
        ))
        .bind(branch_id)
        .bind(chef_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(|r| r.into_model()).collect()
    }

    /// List orders for a branch, newest first
    pub async fn list_orders(&self, branch_id: Uuid, filter: OrderFilter) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE branch_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR order_type = $3)
              AND ($4::date IS NULL OR created_at::date = $4)
            ORDER BY created_at DESC
            "#
        ))
        .bind(branch_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.order_type.map(|t| t.as_str()))
        .bind(filter.date)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(|r| r.into_model()).collect()
    }

    // ------------------------------------------------------------------

    /// Run the deduction engine for the ready transition, inside the
    /// caller's transaction. The chef's active ledger for today's shift
    /// is locked first, then the demanded items in a stable order —
    /// the same ledger-then-stock lock order issuance and return
    /// approval use, so concurrent shift operations cannot deadlock.
    async fn deduct_stock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        order: &Order,
        now: chrono::DateTime<Utc>,
    ) -> AppResult<DeductionReport> {
        let window = ShiftWindow::containing(now);
        let mut ledger = match order.chef_id {
            Some(chef_id) => {
                ShiftLedgerService::fetch_active_record_for_update(
                    tx,
                    order.branch_id,
                    chef_id,
                    window.date,
                )
                .await?
            }
            None => None,
        };

        let mut demanded: Vec<Uuid> = order
            .items
            .iter()
            .flat_map(|l| l.ingredient_demand())
            .map(|(id, _)| id)
            .collect();
        demanded.sort();
        demanded.dedup();

        let mut stock = HashMap::with_capacity(demanded.len());
        for id in demanded {
            // missing items surface in the report as per-line failures,
            // not as a fatal error here
            match StockService::fetch_item_for_update(tx, order.branch_id, id).await {
                Ok(item) => {
                    stock.insert(id, item);
                }
                Err(AppError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }

        let report = run_deduction(&order.items, &mut stock, ledger.as_mut(), now);
        tracing::debug!(
            order_id = %order.id,
            value = %report.total_deducted_value(),
            "stock deduction applied"
        );

        for failure in report.failures() {
            tracing::warn!(order_id = %order.id, %failure, "stock deduction failure");
        }
        if report.has_shortfalls() {
            tracing::warn!(order_id = %order.id, "stock deduction clamped at zero for some items");
        }
        if self.deduction_config.block_order_on_failure && report.has_failures() {
            let detail: Vec<String> = report.failures().map(|f| f.to_string()).collect();
            return Err(AppError::InsufficientStock(detail.join("; ")));
        }

        for item in stock.values() {
            StockService::persist_item(tx, item).await?;
            StockService::persist_movements(tx, item.id, &item.movements).await?;
        }
        if let Some(record) = &ledger {
            ShiftLedgerService::persist_record(tx, record).await?;
        }

        Ok(report)
    }

    fn authorize_transition(
        order: &Order,
        worker: &CurrentWorker,
        next: OrderStatus,
    ) -> AppResult<()> {
        match next {
            // only the chef who accepted the order moves it through the
            // kitchen
            OrderStatus::Preparing | OrderStatus::Ready => {
                if order.chef_id != Some(worker.worker_id) {
                    return Err(AppError::NotAuthorized(
                        "only the assigned chef can update this order".to_string(),
                    ));
                }
            }
            OrderStatus::OutForDelivery | OrderStatus::Returned => {
                if order.delivery_worker_id != Some(worker.worker_id) {
                    return Err(AppError::NotAuthorized(
                        "only the assigned delivery worker can update this order".to_string(),
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Per-branch, per-day order numbers: `ORD-YYYYMMDD-NNNN`. The
    /// counter row is upserted atomically so concurrent creations never
    /// collide.
    async fn next_order_number(
        tx: &mut Transaction<'_, Postgres>,
        branch_id: Uuid,
    ) -> AppResult<String> {
        let today = Utc::now().date_naive();
        let (n,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO order_counters (branch_id, day, counter)
            VALUES ($1, $2, 1)
            ON CONFLICT (branch_id, day)
            DO UPDATE SET counter = order_counters.counter + 1
            RETURNING counter
            "#,
        )
        .bind(branch_id)
        .bind(today)
        .fetch_one(&mut **tx)
        .await?;

        Ok(format!("ORD-{}-{:04}", today.format("%Y%m%d"), n))
    }

    async fn fetch_order_for_update(
        tx: &mut Transaction<'_, Postgres>,
        branch_id: Uuid,
        order_id: Uuid,
    ) -> AppResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND branch_id = $2 FOR UPDATE"
        ))
        .bind(order_id)
        .bind(branch_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
        row.into_model()
    }

    /// Status, the deduction guard, and every transition side effect go
    /// out in one write.
    async fn persist_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, stock_deducted = $2, chef_id = $3, delivery_worker_id = $4,
                cashier_id = $5, additional_delay_minutes = $6,
                start_meter_reading = $7, end_meter_reading = $8, distance_travelled = $9,
                cash_received = $10, notes = $11,
                accepted_at = $12, preparing_at = $13, ready_at = $14, departed_at = $15,
                delivered_at = $16, completed_at = $17
            WHERE id = $18
            "#,
        )
        .bind(order.status.as_str())
        .bind(order.stock_deducted)
        .bind(order.chef_id)
        .bind(order.delivery_worker_id)
        .bind(order.cashier_id)
        .bind(order.additional_delay_minutes)
        .bind(order.start_meter_reading)
        .bind(order.end_meter_reading)
        .bind(order.distance_travelled)
        .bind(order.cash_received)
        .bind(&order.notes)
        .bind(order.accepted_at)
        .bind(order.preparing_at)
        .bind(order.ready_at)
        .bind(order.departed_at)
        .bind(order.delivered_at)
        .bind(order.completed_at)
        .bind(order.id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
