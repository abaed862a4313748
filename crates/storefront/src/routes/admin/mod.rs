//! Admin API route handlers.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin),
//! which re-checks the role against the database.
//!
//! ```text
//! GET    /api/admin/dashboard
//! GET    /api/admin/products                 POST   /api/admin/products
//! PUT    /api/admin/products/{id}            DELETE /api/admin/products/{id}
//! PATCH  /api/admin/products/{id}/stock
//! PUT    /api/admin/featured/{category}
//! GET    /api/admin/orders                   GET    /api/admin/orders/{id}
//! PUT    /api/admin/orders/{id}/status
//! GET    /api/admin/coupons                  POST   /api/admin/coupons
//! PUT    /api/admin/coupons/{id}             DELETE /api/admin/coupons/{id}
//! GET    /api/admin/users                    PUT    /api/admin/users/{id}/role
//! GET    /api/admin/banners                  POST   /api/admin/banners
//! PUT    /api/admin/banners/{id}             DELETE /api/admin/banners/{id}
//! ```

pub mod banners;
pub mod coupons;
pub mod orders;
pub mod products;
pub mod users;

use axum::{
    Router,
    extract::State,
    response::IntoResponse,
    routing::{get, patch, put},
};
use tracing::instrument;

use super::ok;
use crate::db::dashboard;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

/// Create the admin routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard_stats))
        .route("/products", get(products::index).post(products::create))
        .route(
            "/products/{id}",
            put(products::update).delete(products::delete),
        )
        .route("/products/{id}/stock", patch(products::adjust_stock))
        .route("/featured/{category}", put(products::set_featured))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", put(orders::update_status))
        .route("/coupons", get(coupons::index).post(coupons::create))
        .route(
            "/coupons/{id}",
            put(coupons::update).delete(coupons::delete),
        )
        .route("/users", get(users::index))
        .route("/users/{id}/role", put(users::set_role))
        .route("/banners", get(banners::index).post(banners::create))
        .route(
            "/banners/{id}",
            put(banners::update).delete(banners::delete),
        )
}

/// Store-wide statistics.
///
/// GET /api/admin/dashboard
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn dashboard_stats(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
) -> Result<impl IntoResponse, AppError> {
    let stats = dashboard::load(state.pool()).await?;
    Ok(ok(stats))
}
