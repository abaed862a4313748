//! Admin coupon management.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{info, instrument};

use kirana_core::CouponId;

use crate::db::CouponRepository;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::CouponInput;
use crate::routes::{ApiJson, ApiPath, done, ok, ok_with};
use crate::state::AppState;

/// Every coupon, including expired and inactive ones.
///
/// GET /api/admin/coupons
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<impl IntoResponse, AppError> {
    let coupons = CouponRepository::new(state.pool()).list_all().await?;
    Ok(ok(coupons))
}

/// Create a coupon.
///
/// POST /api/admin/coupons
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<CouponInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalised()?;
    let coupon = CouponRepository::new(state.pool()).create(&input).await?;

    info!(coupon_id = %coupon.id, code = %coupon.code, "Coupon created");
    Ok((StatusCode::CREATED, ok_with("Coupon created", coupon)))
}

/// Replace a coupon's settings. Usage counts are kept.
///
/// PUT /api/admin/coupons/{id}
#[instrument(skip_all, fields(admin_id = %admin.id, coupon_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<CouponId>,
    ApiJson(body): ApiJson<CouponInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalised()?;
    let coupon = CouponRepository::new(state.pool())
        .update(id, &input)
        .await?;
    Ok(ok_with("Coupon updated", coupon))
}

/// Delete a coupon.
///
/// DELETE /api/admin/coupons/{id}
#[instrument(skip_all, fields(admin_id = %admin.id, coupon_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<CouponId>,
) -> Result<impl IntoResponse, AppError> {
    CouponRepository::new(state.pool()).delete(id).await?;
    Ok(done("Coupon deleted"))
}
