//! Admin user management.

use axum::{extract::State, response::IntoResponse};
use serde::Deserialize;
use tracing::{info, instrument};

use kirana_core::{UserId, UserRole};

use crate::db::{PageRequest, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::routes::{ApiJson, ApiPath, ApiQuery, Page, ok, ok_with};
use crate::state::AppState;

/// User search.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    /// Matches name or email.
    pub search: Option<String>,
}

/// Role change body.
#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: UserRole,
}

/// Users, newest first.
///
/// GET /api/admin/users?search=&page=&limit=
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiQuery(query): ApiQuery<UserQuery>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let result = UserRepository::new(state.pool())
        .list(search, &page)
        .await?;
    Ok(ok(Page::from(result)))
}

/// Change a user's role. Admins cannot demote themselves.
///
/// PUT /api/admin/users/{id}/role
#[instrument(skip_all, fields(admin_id = %admin.id, user_id = %id, role = %body.role))]
pub async fn set_role(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(body): ApiJson<RoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    if id == admin.id && body.role != UserRole::Admin {
        return Err(AppError::BadRequest(
            "You cannot remove your own admin role".to_owned(),
        ));
    }

    let user = UserRepository::new(state.pool())
        .set_role(id, body.role)
        .await?;

    info!("User role changed");
    Ok(ok_with("Role updated", user))
}
