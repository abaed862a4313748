//! Shopper-facing coupon route handlers.

use axum::{extract::State, response::IntoResponse};
use serde::Deserialize;
use tracing::instrument;

use super::{ApiJson, ok};
use crate::db::CouponRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::services::checkout::ItemRequest;
use crate::state::AppState;

/// Coupon preview body.
#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    /// Items to price; the cart when empty.
    #[serde(default)]
    pub items: Vec<ItemRequest>,
}

/// Price the cart (or the given items) with a coupon applied.
///
/// POST /api/coupons/validate
#[instrument(skip(state, user, body), fields(user_id = %user.id, code = %body.code))]
pub async fn validate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<ValidateCouponRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quote = state
        .orders()
        .quote(user.id, &body.items, Some(&body.code))
        .await?;
    Ok(ok(quote))
}

/// Coupons that are active, in date and not used up.
///
/// GET /api/coupons/available
#[instrument(skip_all)]
pub async fn available(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let coupons = CouponRepository::new(state.pool()).available().await?;
    Ok(ok(coupons))
}
