//! Admin banner management.
//!
//! Every write drops the cached banner list.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::instrument;

use kirana_core::BannerId;

use crate::db::BannerRepository;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::BannerInput;
use crate::routes::{ApiJson, ApiPath, done, ok, ok_with};
use crate::state::AppState;

/// All banners, including inactive ones.
///
/// GET /api/admin/banners
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<impl IntoResponse, AppError> {
    let banners = BannerRepository::new(state.pool()).list(true).await?;
    Ok(ok(banners))
}

/// Create a banner.
///
/// POST /api/admin/banners
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<BannerInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalised()?;
    let banner = BannerRepository::new(state.pool()).create(&input).await?;
    state.cache().invalidate_banners().await;
    Ok((StatusCode::CREATED, ok_with("Banner created", banner)))
}

/// Replace a banner.
///
/// PUT /api/admin/banners/{id}
#[instrument(skip_all, fields(admin_id = %admin.id, banner_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<BannerId>,
    ApiJson(body): ApiJson<BannerInput>,
) -> Result<impl IntoResponse, AppError> {
    let input = body.normalised()?;
    let banner = BannerRepository::new(state.pool())
        .update(id, &input)
        .await?;
    state.cache().invalidate_banners().await;
    Ok(ok_with("Banner updated", banner))
}

/// Delete a banner.
///
/// DELETE /api/admin/banners/{id}
#[instrument(skip_all, fields(admin_id = %admin.id, banner_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<BannerId>,
) -> Result<impl IntoResponse, AppError> {
    BannerRepository::new(state.pool()).delete(id).await?;
    state.cache().invalidate_banners().await;
    Ok(done("Banner deleted"))
}
