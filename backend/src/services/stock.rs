//! Warehouse stock service: item management, purchases, movement audit

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::models::{MovementDirection, StockItem, StockKind, StockMovement, StockUnit};
use shared::validation::{validate_positive_quantity, validate_unit_cost};

use crate::error::{AppError, AppResult};

/// Stock service for warehouse items and their audit trail
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
}

/// Database row for a stock item (movements are stored separately)
#[derive(Debug, FromRow)]
struct StockItemRow {
    id: Uuid,
    branch_id: Uuid,
    name: String,
    category: String,
    kind: String,
    unit: String,
    current_stock: Decimal,
    minimum_stock: Decimal,
    price_per_unit: Decimal,
    average_cost: Decimal,
    total_purchase_value: Decimal,
    total_issue_value: Decimal,
    is_active: bool,
    last_restocked: Option<DateTime<Utc>>,
}

impl StockItemRow {
    fn into_model(self) -> AppResult<StockItem> {
        let kind = match self.kind.as_str() {
            "ingredient" => StockKind::Ingredient,
            "cold_drink" => StockKind::ColdDrink,
            other => {
                return Err(AppError::Internal(format!(
                    "unknown stock kind in database: {}",
                    other
                )))
            }
        };
        let unit = StockUnit::from_str(&self.unit)
            .ok_or_else(|| AppError::Internal(format!("unknown stock unit: {}", self.unit)))?;
        Ok(StockItem {
            id: self.id,
            branch_id: self.branch_id,
            name: self.name,
            category: self.category,
            kind,
            unit,
            current_stock: self.current_stock,
            minimum_stock: self.minimum_stock,
            price_per_unit: self.price_per_unit,
            average_cost: self.average_cost,
            total_purchase_value: self.total_purchase_value,
            total_issue_value: self.total_issue_value,
            is_active: self.is_active,
            last_restocked: self.last_restocked,
            // movements are loaded on demand via get_movements
            movements: Vec::new(),
        })
    }
}

/// Input for creating a stock item
#[derive(Debug, Deserialize)]
pub struct CreateStockItemInput {
    pub name: String,
    pub category: String,
    pub kind: StockKind,
    pub unit: StockUnit,
    pub minimum_stock: Option<Decimal>,
    pub price_per_unit: Decimal,
}

/// Input for recording a purchase
#[derive(Debug, Deserialize)]
pub struct RecordPurchaseInput {
    pub stock_item_id: Uuid,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
    pub supplier: Option<String>,
    pub invoice_number: Option<String>,
    pub notes: Option<String>,
}

/// Persisted stock movement
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockMovementRow {
    pub id: Uuid,
    pub stock_item_id: Uuid,
    pub quantity: Decimal,
    pub direction: String,
    pub moved_at: DateTime<Utc>,
}

/// Stock item with its low/out flags for listings
#[derive(Debug, Serialize)]
pub struct StockOverviewEntry {
    #[serde(flatten)]
    pub item: StockItem,
    pub stock_value: Decimal,
    pub is_low_stock: bool,
    pub is_out_of_stock: bool,
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a warehouse stock item
    pub async fn create_item(
        &self,
        branch_id: Uuid,
        input: CreateStockItemInput,
    ) -> AppResult<StockItem> {
        if input.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Item name cannot be empty".to_string(),
            });
        }
        if let Err(msg) = validate_unit_cost(input.price_per_unit) {
            return Err(AppError::Validation {
                field: "price_per_unit".to_string(),
                message: msg.to_string(),
            });
        }

        let kind = match input.kind {
            StockKind::Ingredient => "ingredient",
            StockKind::ColdDrink => "cold_drink",
        };

        let row = sqlx::query_as::<_, StockItemRow>(
            r#"
            INSERT INTO stock_items (branch_id, name, category, kind, unit, minimum_stock, price_per_unit)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, branch_id, name, category, kind, unit, current_stock, minimum_stock,
                      price_per_unit, average_cost, total_purchase_value, total_issue_value,
                      is_active, last_restocked
            "#,
        )
        .bind(branch_id)
        .bind(&input.name)
        .bind(&input.category)
        .bind(kind)
        .bind(input.unit.as_str())
        .bind(input.minimum_stock.unwrap_or(Decimal::ZERO))
        .bind(input.price_per_unit)
        .fetch_one(&self.db)
        .await?;

        row.into_model()
    }

    /// Soft-deactivate an item; stock rows are never physically deleted.
    pub async fn deactivate_item(&self, branch_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE stock_items SET is_active = false WHERE id = $1 AND branch_id = $2",
        )
        .bind(item_id)
        .bind(branch_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Stock item".to_string()));
        }
        Ok(())
    }

    /// Record a purchase: increments stock and recomputes the weighted
    /// average cost in one transaction with the movement audit row.
    pub async fn record_purchase(
        &self,
        branch_id: Uuid,
        input: RecordPurchaseInput,
    ) -> AppResult<StockItem> {
        if let Err(msg) = validate_positive_quantity(input.quantity) {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: msg.to_string(),
            });
        }
        if let Err(msg) = validate_unit_cost(input.price_per_unit) {
            return Err(AppError::Validation {
                field: "price_per_unit".to_string(),
                message: msg.to_string(),
            });
        }

        let mut tx = self.db.begin().await?;

        let mut item = Self::fetch_item_for_update(&mut tx, branch_id, input.stock_item_id).await?;

        item.record_purchase(input.quantity, input.price_per_unit, Utc::now());
        Self::persist_item(&mut tx, &item).await?;
        Self::persist_movements(&mut tx, item.id, &item.movements).await?;

        tx.commit().await?;
        Ok(item)
    }

    /// Get a single stock item
    pub async fn get_item(&self, branch_id: Uuid, item_id: Uuid) -> AppResult<StockItem> {
        let row = sqlx::query_as::<_, StockItemRow>(
            r#"
            SELECT id, branch_id, name, category, kind, unit, current_stock, minimum_stock,
                   price_per_unit, average_cost, total_purchase_value, total_issue_value,
                   is_active, last_restocked
            FROM stock_items
            WHERE id = $1 AND branch_id = $2
            "#,
        )
        .bind(item_id)
        .bind(branch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock item".to_string()))?;

        row.into_model()
    }

    /// List active items with valuation and low/out flags, ingredients
    /// and cold-drink variants combined.
    pub async fn get_stock_overview(&self, branch_id: Uuid) -> AppResult<Vec<StockOverviewEntry>> {
        let rows = sqlx::query_as::<_, StockItemRow>(
            r#"
            SELECT id, branch_id, name, category, kind, unit, current_stock, minimum_stock,
                   price_per_unit, average_cost, total_purchase_value, total_issue_value,
                   is_active, last_restocked
            FROM stock_items
            WHERE branch_id = $1 AND is_active = true
            ORDER BY category, name
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|r| {
                let item = r.into_model()?;
                Ok(StockOverviewEntry {
                    stock_value: item.stock_value(),
                    is_low_stock: item.is_low_stock(),
                    is_out_of_stock: item.is_out_of_stock(),
                    item,
                })
            })
            .collect()
    }

    /// Items at or below their reorder threshold
    pub async fn get_low_stock_items(&self, branch_id: Uuid) -> AppResult<Vec<StockItem>> {
        let rows = sqlx::query_as::<_, StockItemRow>(
            r#"
            SELECT id, branch_id, name, category, kind, unit, current_stock, minimum_stock,
                   price_per_unit, average_cost, total_purchase_value, total_issue_value,
                   is_active, last_restocked
            FROM stock_items
            WHERE branch_id = $1 AND is_active = true AND current_stock <= minimum_stock
            ORDER BY name
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(|r| r.into_model()).collect()
    }

    /// Movement history for an item, newest first
    pub async fn get_movements(
        &self,
        branch_id: Uuid,
        item_id: Uuid,
    ) -> AppResult<Vec<StockMovementRow>> {
        // validate ownership first
        self.get_item(branch_id, item_id).await?;

        let movements = sqlx::query_as::<_, StockMovementRow>(
            r#"
            SELECT id, stock_item_id, quantity, direction, moved_at
            FROM stock_movements
            WHERE stock_item_id = $1
            ORDER BY moved_at DESC
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.db)
        .await?;

        Ok(movements)
    }

    // ------------------------------------------------------------------
    // Transaction helpers shared with the order/ledger services. Items
    // are loaded FOR UPDATE so read-modify-write sequences do not lose
    // concurrent updates.
    // ------------------------------------------------------------------

    pub(crate) async fn fetch_item_for_update(
        tx: &mut Transaction<'_, Postgres>,
        branch_id: Uuid,
        item_id: Uuid,
    ) -> AppResult<StockItem> {
        let row = sqlx::query_as::<_, StockItemRow>(
            r#"
            SELECT id, branch_id, name, category, kind, unit, current_stock, minimum_stock,
                   price_per_unit, average_cost, total_purchase_value, total_issue_value,
                   is_active, last_restocked
            FROM stock_items
            WHERE id = $1 AND branch_id = $2
            FOR UPDATE
            "#,
        )
        .bind(item_id)
        .bind(branch_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Stock item".to_string()))?;

        row.into_model()
    }

    pub(crate) async fn persist_item(
        tx: &mut Transaction<'_, Postgres>,
        item: &StockItem,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE stock_items
            SET current_stock = $1, average_cost = $2, total_purchase_value = $3,
                total_issue_value = $4, last_restocked = $5
            WHERE id = $6
            "#,
        )
        .bind(item.current_stock)
        .bind(item.average_cost)
        .bind(item.total_purchase_value)
        .bind(item.total_issue_value)
        .bind(item.last_restocked)
        .bind(item.id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Append movement audit rows. The in-memory model starts with an
    /// empty movement list when loaded, so whatever the mutation methods
    /// pushed is exactly the set of new rows.
    pub(crate) async fn persist_movements(
        tx: &mut Transaction<'_, Postgres>,
        item_id: Uuid,
        movements: &[StockMovement],
    ) -> AppResult<()> {
        for movement in movements {
            sqlx::query(
                r#"
                INSERT INTO stock_movements (stock_item_id, quantity, direction, moved_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(item_id)
            .bind(movement.quantity)
            .bind(match movement.direction {
                MovementDirection::In => "in",
                MovementDirection::Out => "out",
            })
            .bind(movement.date)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}
