//! Wishlist route handlers.

use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use kirana_core::ProductId;

use super::{ApiPath, done, ok};
use crate::db::{CartRepository, ProductRepository};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::state::AppState;

/// The wishlist, newest first.
///
/// GET /api/wishlist
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let entries = CartRepository::new(state.pool()).wishlist(user.id).await?;
    Ok(ok(entries))
}

/// Add a product; adding twice is a no-op.
///
/// POST /api/wishlist/{product_id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<impl IntoResponse, AppError> {
    ProductRepository::new(state.pool())
        .get(product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product not found".to_owned()))?;

    CartRepository::new(state.pool())
        .wishlist_add(user.id, product_id)
        .await?;
    Ok(done("Added to wishlist"))
}

/// Remove a product.
///
/// DELETE /api/wishlist/{product_id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<impl IntoResponse, AppError> {
    CartRepository::new(state.pool())
        .wishlist_remove(user.id, product_id)
        .await?;
    Ok(done("Removed from wishlist"))
}
