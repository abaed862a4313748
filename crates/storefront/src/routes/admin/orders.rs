//! Admin order management.

use axum::{extract::State, response::IntoResponse};
use serde::Deserialize;
use tracing::instrument;

use kirana_core::{OrderId, OrderStatus, UserId};

use crate::db::{OrderRepository, PageRequest};
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{DeliveryUpdate, OrderWithItems};
use crate::routes::{ApiJson, ApiPath, ApiQuery, Page, ok, ok_with};
use crate::state::AppState;

/// Admin order list filter.
#[derive(Debug, Deserialize)]
pub struct AdminOrderQuery {
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
}

/// Status change body.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
    #[serde(flatten)]
    pub delivery: DeliveryUpdate,
}

/// All orders, newest first.
///
/// GET /api/admin/orders?status=&user_id=&page=&limit=
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiQuery(query): ApiQuery<AdminOrderQuery>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let repo = OrderRepository::new(state.pool());
    let (orders, pagination) = repo.list(query.user_id, query.status, &page).await?;

    let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
    let items = repo.items_for(&ids).await?;

    Ok(ok(Page {
        items: OrderWithItems::group(orders, items),
        pagination,
    }))
}

/// Any order with its lines.
///
/// GET /api/admin/orders/{id}
#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<impl IntoResponse, AppError> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;
    let items = repo.items(order.id).await?;
    Ok(ok(OrderWithItems { order, items }))
}

/// Move an order along its lifecycle.
///
/// PUT /api/admin/orders/{id}/status
#[instrument(skip_all, fields(admin_id = %admin.id, order_id = %id, status = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let order = state
        .orders()
        .update_status(id, body.status, body.delivery)
        .await?;
    Ok(ok_with("Order status updated", order))
}
