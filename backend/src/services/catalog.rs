//! Catalog lookup: resolves submitted menu references into order lines
//! with their ingredient requirements captured at order time.
//!
//! The catalog itself (products, deals, cold drinks) is maintained by a
//! collaborator outside this core; this service only reads it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use shared::models::{IngredientRequirement, OrderLineItem};

use crate::error::{AppError, AppResult};

/// Catalog service for resolving menu items
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

/// A size option of a product, with its recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSize {
    pub size: String,
    pub price: Decimal,
    #[serde(default)]
    pub ingredients: Vec<IngredientRequirement>,
}

/// A constituent of a deal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealComponent {
    pub product_id: Uuid,
    pub size: String,
    pub quantity: Decimal,
}

/// A submitted order line, before catalog resolution
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NewOrderLine {
    Product {
        product_id: Uuid,
        size: String,
        quantity: Decimal,
    },
    Deal {
        deal_id: Uuid,
        quantity: Decimal,
    },
    ColdDrink {
        stock_item_id: Uuid,
        quantity: Decimal,
    },
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    sizes: sqlx::types::Json<Vec<ProductSize>>,
}

#[derive(Debug, FromRow)]
struct DealRow {
    id: Uuid,
    name: String,
    price: Decimal,
    components: sqlx::types::Json<Vec<DealComponent>>,
}

#[derive(Debug, FromRow)]
struct ColdDrinkRow {
    id: Uuid,
    name: String,
    unit: String,
    sale_price: Decimal,
}

impl CatalogService {
    /// Create a new CatalogService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Resolve submitted lines into order line items. Ingredient lists
    /// are captured here so later deduction does not depend on catalog
    /// edits made after the order was placed.
    pub async fn resolve_lines(
        &self,
        branch_id: Uuid,
        lines: &[NewOrderLine],
    ) -> AppResult<Vec<OrderLineItem>> {
        if lines.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "At least one item is required".to_string(),
            });
        }

        let mut resolved = Vec::with_capacity(lines.len());
        for line in lines {
            resolved.push(self.resolve_line(branch_id, line).await?);
        }
        Ok(resolved)
    }

    async fn resolve_line(&self, branch_id: Uuid, line: &NewOrderLine) -> AppResult<OrderLineItem> {
        match line {
            NewOrderLine::Product {
                product_id,
                size,
                quantity,
            } => {
                let product = self.fetch_product(branch_id, *product_id).await?;
                let size_data = product
                    .sizes
                    .0
                    .iter()
                    .find(|s| s.size == *size)
                    .ok_or_else(|| AppError::Validation {
                        field: "size".to_string(),
                        message: format!("{} has no size {}", product.name, size),
                    })?;

                Ok(OrderLineItem::Product {
                    product_id: product.id,
                    name: product.name.clone(),
                    size: size_data.size.clone(),
                    quantity: *quantity,
                    unit_price: size_data.price,
                    ingredients: size_data.ingredients.clone(),
                })
            }
            NewOrderLine::Deal { deal_id, quantity } => {
                let deal = self.fetch_deal(branch_id, *deal_id).await?;
                let mut ingredients: Vec<IngredientRequirement> = Vec::new();

                for component in &deal.components.0 {
                    let product = self.fetch_product(branch_id, component.product_id).await?;
                    let size_data = product
                        .sizes
                        .0
                        .iter()
                        .find(|s| s.size == component.size)
                        .ok_or_else(|| AppError::Validation {
                            field: "components".to_string(),
                            message: format!(
                                "{} has no size {} referenced by deal {}",
                                product.name, component.size, deal.name
                            ),
                        })?;

                    // scale each constituent's recipe by its per-deal count,
                    // merging duplicate stock items into one requirement
                    for ing in &size_data.ingredients {
                        let scaled = ing.quantity_per_unit * component.quantity;
                        match ingredients
                            .iter_mut()
                            .find(|existing| existing.stock_item_id == ing.stock_item_id)
                        {
                            Some(existing) => existing.quantity_per_unit += scaled,
                            None => ingredients.push(IngredientRequirement {
                                stock_item_id: ing.stock_item_id,
                                quantity_per_unit: scaled,
                                unit: ing.unit.clone(),
                            }),
                        }
                    }
                }

                Ok(OrderLineItem::Deal {
                    deal_id: deal.id,
                    name: deal.name,
                    quantity: *quantity,
                    unit_price: deal.price,
                    ingredients,
                })
            }
            NewOrderLine::ColdDrink {
                stock_item_id,
                quantity,
            } => {
                let drink = self.fetch_cold_drink(branch_id, *stock_item_id).await?;
                Ok(OrderLineItem::ColdDrink {
                    stock_item_id: drink.id,
                    name: drink.name,
                    size: drink.unit,
                    quantity: *quantity,
                    unit_price: drink.sale_price,
                })
            }
        }
    }

    async fn fetch_product(&self, branch_id: Uuid, product_id: Uuid) -> AppResult<ProductRow> {
        sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, sizes FROM products WHERE id = $1 AND branch_id = $2 AND is_active = true",
        )
        .bind(product_id)
        .bind(branch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    async fn fetch_deal(&self, branch_id: Uuid, deal_id: Uuid) -> AppResult<DealRow> {
        sqlx::query_as::<_, DealRow>(
            "SELECT id, name, price, components FROM deals WHERE id = $1 AND branch_id = $2 AND is_active = true",
        )
        .bind(deal_id)
        .bind(branch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Deal".to_string()))
    }

    async fn fetch_cold_drink(&self, branch_id: Uuid, item_id: Uuid) -> AppResult<ColdDrinkRow> {
        sqlx::query_as::<_, ColdDrinkRow>(
            r#"
            SELECT id, name, unit, COALESCE(sale_price, price_per_unit) AS sale_price
            FROM stock_items
            WHERE id = $1 AND branch_id = $2 AND kind = 'cold_drink' AND is_active = true
            "#,
        )
        .bind(item_id)
        .bind(branch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Cold drink".to_string()))
    }
}
