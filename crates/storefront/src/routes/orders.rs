//! Customer order route handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::instrument;

use kirana_core::{OrderId, OrderStatus};

use super::{ApiJson, ApiPath, ApiQuery, Page, ok, ok_with};
use crate::db::{OrderRepository, PageRequest};
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::OrderWithItems;
use crate::services::checkout::{Actor, PlaceOrderRequest};
use crate::state::AppState;

/// Order list filter.
#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
}

/// Place an order from the given items or, when none are given, the cart.
///
/// POST /api/orders
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<PlaceOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let placed = state.orders().place_order(user.id, body).await?;

    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_number", placed.order.order.order_number.as_str())]),
    );
    Ok((StatusCode::CREATED, ok_with("Order placed", placed)))
}

/// The caller's orders, newest first, with their lines.
///
/// GET /api/orders?status=&page=&limit=
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiQuery(query): ApiQuery<OrderListQuery>,
    ApiQuery(page): ApiQuery<PageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let repo = OrderRepository::new(state.pool());
    let (orders, pagination) = repo.list(Some(user.id), query.status, &page).await?;

    let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
    let items = repo.items_for(&ids).await?;

    Ok(ok(Page {
        items: OrderWithItems::group(orders, items),
        pagination,
    }))
}

/// One of the caller's orders.
///
/// GET /api/orders/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<impl IntoResponse, AppError> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get(id)
        .await?
        .filter(|o| o.user_id == user.id)
        .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;
    let items = repo.items(order.id).await?;

    Ok(ok(OrderWithItems { order, items }))
}

/// Cancel one of the caller's orders while it is still pending or
/// confirmed.
///
/// POST /api/orders/{id}/cancel
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<impl IntoResponse, AppError> {
    let order = state
        .orders()
        .cancel_order(id, Actor::Customer(user.id))
        .await?;
    Ok(ok_with("Order cancelled", order))
}
