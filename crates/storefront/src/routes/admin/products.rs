//! Admin catalog management.
//!
//! Every write drops the cached featured lists.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use kirana_core::ProductId;

use crate::routes::{ApiJson, ApiPath, ApiQuery, Page, ok, ok_with};
use crate::db::products::{DeleteOutcome, ProductFilter};
use crate::db::{PageRequest, ProductRepository};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::ProductInput;
use crate::state::AppState;

/// Largest stock change accepted in one adjustment.
pub const MAX_STOCK_DELTA: i32 = 1_000_000;

/// Stock adjustment body.
#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    /// Units to add (positive) or remove (negative).
    pub delta: i32,
}

impl StockAdjustment {
    /// The delta, if it is non-zero and within `MAX_STOCK_DELTA` either way.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` otherwise.
    pub fn checked_delta(&self) -> Result<i32, AppError> {
        if self.delta == 0 {
            return Err(AppError::BadRequest("delta must not be zero".to_owned()));
        }
        if self.delta.unsigned_abs() > MAX_STOCK_DELTA.unsigned_abs() {
            return Err(AppError::BadRequest(format!(
                "delta must be between -{MAX_STOCK_DELTA} and {MAX_STOCK_DELTA}"
            )));
        }
        Ok(self.delta)
    }
}

/// Featured list body.
#[derive(Debug, Deserialize)]
pub struct FeaturedRequest {
    /// Product IDs in display order; empty removes the category.
    pub product_ids: Vec<ProductId>,
}

/// Result of a delete.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub outcome: DeleteOutcome,
}

/// All products, including deactivated ones.
///
/// GET /api/admin/products
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiQuery(filter): ApiQuery<ProductFilter>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ProductFilter {
        include_inactive: true,
        ..filter
    };
    let result = ProductRepository::new(state.pool())
        .list(&filter, &page)
        .await?;
    Ok(ok(Page::from(result)))
}

/// Create a product.
///
/// POST /api/admin/products
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<ProductInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalised()?;
    let product = ProductRepository::new(state.pool()).create(&input).await?;
    state.cache().invalidate_featured().await;

    info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, ok_with("Product created", product)))
}

/// Replace a product's fields.
///
/// PUT /api/admin/products/{id}
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<ProductInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalised()?;
    let product = ProductRepository::new(state.pool())
        .update(id, &input)
        .await?;
    state.cache().invalidate_featured().await;
    Ok(ok_with("Product updated", product))
}

/// Delete a product, or deactivate it when orders reference it.
///
/// DELETE /api/admin/products/{id}
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = ProductRepository::new(state.pool()).delete(id).await?;
    state.cache().invalidate_featured().await;

    info!(?outcome, "Product removed");
    let message = match outcome {
        DeleteOutcome::Deleted => "Product deleted",
        DeleteOutcome::Deactivated => "Product has orders; it was deactivated instead",
    };
    Ok(ok_with(message, DeleteResponse { outcome }))
}

/// Add or remove stock.
///
/// PATCH /api/admin/products/{id}/stock
#[instrument(skip_all, fields(admin_id = %admin.id, product_id = %id, delta = body.delta))]
pub async fn adjust_stock(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<StockAdjustment>,
) -> Result<impl IntoResponse, AppError> {
    let delta = body.checked_delta()?;
    let product = ProductRepository::new(state.pool())
        .adjust_stock(id, delta)
        .await?;
    state.cache().invalidate_featured().await;

    info!(stock = product.stock, "Stock adjusted");
    Ok(ok_with("Stock updated", product))
}

/// Set the featured products of a category.
///
/// PUT /api/admin/featured/{category}
#[instrument(skip_all, fields(admin_id = %admin.id, %category))]
pub async fn set_featured(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(category): ApiPath<String>,
    ApiJson(body): ApiJson<FeaturedRequest>,
) -> Result<impl IntoResponse, AppError> {
    let category = category.trim().to_lowercase();
    if category.is_empty() {
        return Err(AppError::BadRequest("category is required".to_owned()));
    }

    let repo = ProductRepository::new(state.pool());
    repo.set_featured(&category, &body.product_ids).await?;
    state.cache().invalidate_featured().await;

    let featured = repo.featured().await?;
    Ok(ok_with("Featured products updated", featured))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_delta_bounds() {
        assert_eq!(StockAdjustment { delta: -5 }.checked_delta().ok(), Some(-5));
        assert_eq!(
            StockAdjustment { delta: MAX_STOCK_DELTA }.checked_delta().ok(),
            Some(MAX_STOCK_DELTA)
        );
        assert_eq!(
            StockAdjustment { delta: -MAX_STOCK_DELTA }.checked_delta().ok(),
            Some(-MAX_STOCK_DELTA)
        );

        for delta in [0, MAX_STOCK_DELTA + 1, -MAX_STOCK_DELTA - 1, i32::MAX, i32::MIN] {
            assert!(
                matches!(
                    StockAdjustment { delta }.checked_delta(),
                    Err(AppError::BadRequest(_))
                ),
                "{delta}"
            );
        }
    }
}
