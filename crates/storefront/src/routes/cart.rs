//! Cart route handlers.
//!
//! Quantities are capped at the per-line maximum and at live stock; prices
//! shown here are always the current product prices.

use axum::{extract::State, response::IntoResponse};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use kirana_core::{ProductId, UserId};

use super::{ApiJson, ApiPath, done, ok, ok_with};
use crate::db::cart::CartLine;
use crate::db::{CartRepository, ProductRepository};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::Product;
use crate::services::checkout::{CheckoutError, MAX_LINE_QUANTITY};
use crate::state::AppState;

/// Cart contents with totals.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    /// Total units across lines.
    pub item_count: i64,
    pub subtotal: Decimal,
}

impl From<Vec<CartLine>> for CartView {
    fn from(items: Vec<CartLine>) -> Self {
        let item_count = items.iter().map(|l| i64::from(l.quantity)).sum();
        let subtotal = items.iter().map(|l| l.line_total).sum();
        Self {
            items,
            item_count,
            subtotal,
        }
    }
}

/// Add-to-cart body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

/// Set-quantity body.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub quantity: i32,
}

fn check_quantity(product_id: ProductId, quantity: i32) -> Result<(), CheckoutError> {
    if (1..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(CheckoutError::InvalidQuantity {
            product_id,
            quantity,
            max: MAX_LINE_QUANTITY,
        })
    }
}

async fn sellable_product(state: &AppState, id: ProductId) -> Result<Product, AppError> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))
}

async fn view(state: &AppState, user_id: UserId) -> Result<CartView, AppError> {
    let lines = CartRepository::new(state.pool()).lines(user_id).await?;
    Ok(CartView::from(lines))
}

/// The cart.
///
/// GET /api/cart
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(view(&state, user.id).await?))
}

/// Add units of a product, merging with an existing line.
///
/// POST /api/cart
#[instrument(skip(state, user, body), fields(user_id = %user.id, product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<AddToCartRequest>,
) -> Result<impl IntoResponse, AppError> {
    check_quantity(body.product_id, body.quantity)?;
    let product = sellable_product(&state, body.product_id).await?;
    if product.stock < 1 {
        return Err(CheckoutError::InsufficientStock {
            product_id: product.id,
            name: product.name,
            available: 0,
        }
        .into());
    }

    let cap = MAX_LINE_QUANTITY.min(product.stock);
    let quantity = CartRepository::new(state.pool())
        .add(user.id, product.id, body.quantity, cap)
        .await?;

    info!(quantity, "Added to cart");
    Ok(ok_with("Added to cart", view(&state, user.id).await?))
}

/// Set a line's quantity.
///
/// PUT /api/cart/{product_id}
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<UpdateCartRequest>,
) -> Result<impl IntoResponse, AppError> {
    check_quantity(product_id, body.quantity)?;
    let product = sellable_product(&state, product_id).await?;
    if !product.has_stock_for(body.quantity) {
        return Err(CheckoutError::InsufficientStock {
            product_id,
            name: product.name,
            available: product.stock.max(0),
        }
        .into());
    }

    CartRepository::new(state.pool())
        .set_quantity(user.id, product_id, body.quantity)
        .await?;
    Ok(ok_with("Cart updated", view(&state, user.id).await?))
}

/// Remove a line.
///
/// DELETE /api/cart/{product_id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<impl IntoResponse, AppError> {
    CartRepository::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    Ok(ok_with("Removed from cart", view(&state, user.id).await?))
}

/// Empty the cart.
///
/// DELETE /api/cart
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    CartRepository::new(state.pool()).clear(user.id).await?;
    Ok(done("Cart cleared"))
}
