//! Profile route handlers.

use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
};
use tracing::{info, instrument};

use super::{ApiJson, ok, ok_with};
use crate::db::UserRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, ProfileUpdate, User};
use crate::services::uploads::UploadError;
use crate::state::AppState;

/// Multipart field carrying the avatar.
const AVATAR_FIELD: &str = "avatar";

async fn load_user(state: &AppState, user: &CurrentUser) -> Result<User, AppError> {
    UserRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Please log in to continue".to_owned()))
}

/// The caller's profile.
///
/// GET /api/users/profile
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(load_user(&state, &user).await?))
}

/// Update name and/or phone.
///
/// PUT /api/users/profile
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<ProfileUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let (name, phone) = body.normalise()?;
    let updated = UserRepository::new(state.pool())
        .update_profile(
            user.id,
            name.as_deref(),
            phone.as_ref().map(Option::as_deref),
        )
        .await?;
    Ok(ok_with("Profile updated", updated))
}

/// Replace the profile picture.
///
/// POST /api/users/avatar (multipart, field `avatar`)
#[instrument(skip(state, user, multipart), fields(user_id = %user.id))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut bytes = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(AVATAR_FIELD) {
            bytes = Some(field.bytes().await?);
            break;
        }
    }
    let bytes = bytes.ok_or(UploadError::Missing)?;

    let url = state.avatars().save(user.id, &bytes).await?;
    let previous = UserRepository::new(state.pool())
        .set_avatar(user.id, &url)
        .await?;
    if let Some(previous) = previous.filter(|p| *p != url) {
        state.avatars().remove(&previous).await;
    }

    info!(%url, "Avatar updated");
    Ok(ok_with("Avatar updated", load_user(&state, &user).await?))
}
