//! Public banner route handler.

use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use super::ok;
use crate::error::AppError;
use crate::state::AppState;

/// Active banners ordered by position (cached).
///
/// GET /api/banner
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let banners = state.cache().banners(state.pool()).await?;
    Ok(ok(banners))
}
