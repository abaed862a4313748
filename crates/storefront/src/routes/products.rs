//! Public catalog route handlers.

use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use kirana_core::ProductId;

use super::{ApiPath, ApiQuery, Page, ok};
use crate::db::products::ProductFilter;
use crate::db::{PageRequest, ProductRepository};
use crate::error::AppError;
use crate::state::AppState;

/// List active products.
///
/// GET /api/products?search=&category=&brand=&min_price=&max_price=&in_stock=&sort=&page=&limit=
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let filter = ProductFilter {
        include_inactive: false,
        ..filter
    };
    let result = ProductRepository::new(state.pool())
        .list(&filter, &page)
        .await?;
    Ok(ok(Page::from(result)))
}

/// One active product.
///
/// GET /api/products/{id}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<impl IntoResponse, AppError> {
    let product = ProductRepository::new(state.pool())
        .get(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;
    Ok(ok(product))
}

/// Categories with product counts.
///
/// GET /api/products/categories
#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let categories = ProductRepository::new(state.pool()).categories().await?;
    Ok(ok(categories))
}

/// Featured products by category (cached).
///
/// GET /api/products/featured
#[instrument(skip(state))]
pub async fn featured(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let featured = state.cache().featured(state.pool()).await?;
    Ok(ok(featured))
}
