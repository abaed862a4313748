//! Aggregate queries for the admin dashboard.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use kirana_core::{OrderStatus, ProductId};

use super::RepositoryError;

/// Products at or below this stock level are flagged.
pub const LOW_STOCK_THRESHOLD: i32 = 5;
/// How many best sellers to report.
pub const TOP_PRODUCTS: i64 = 5;
/// Days of revenue history.
pub const REVENUE_DAYS: i32 = 30;

/// Headline counts.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Totals {
    pub orders: i64,
    pub revenue: Decimal,
    pub users: i64,
    pub products: i64,
}

/// Orders in one status.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Paid revenue on one day.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailyRevenue {
    pub day: NaiveDate,
    pub revenue: Decimal,
    pub orders: i64,
}

/// A best-selling product.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: ProductId,
    pub name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// A product running low.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LowStockProduct {
    pub id: ProductId,
    pub name: String,
    pub stock: i32,
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub totals: Totals,
    pub orders_by_status: Vec<StatusCount>,
    pub revenue_by_day: Vec<DailyRevenue>,
    pub top_products: Vec<TopProduct>,
    pub low_stock: Vec<LowStockProduct>,
}

/// Load dashboard statistics.
///
/// Revenue only counts paid orders; cancelled orders are left out of the
/// best-seller ranking.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if any query fails.
pub async fn load(pool: &PgPool) -> Result<DashboardStats, RepositoryError> {
    let totals = sqlx::query_as::<_, Totals>(
        r"
        SELECT
            (SELECT COUNT(*) FROM shop_order) AS orders,
            (SELECT COALESCE(SUM(total), 0) FROM shop_order WHERE payment_status = 'paid') AS revenue,
            (SELECT COUNT(*) FROM app_user) AS users,
            (SELECT COUNT(*) FROM product WHERE is_active) AS products
        ",
    )
    .fetch_one(pool)
    .await?;

    let orders_by_status = sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count FROM shop_order GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;

    let revenue_by_day = sqlx::query_as::<_, DailyRevenue>(
        r"
        SELECT d.day::date AS day,
               COALESCE(SUM(o.total), 0) AS revenue,
               COUNT(o.id) AS orders
        FROM generate_series(
                 CURRENT_DATE - ($1 - 1),
                 CURRENT_DATE,
                 INTERVAL '1 day'
             ) AS d(day)
        LEFT JOIN shop_order o
               ON o.payment_status = 'paid' AND o.paid_at::date = d.day::date
        GROUP BY d.day
        ORDER BY d.day
        ",
    )
    .bind(REVENUE_DAYS)
    .fetch_all(pool)
    .await?;

    let top_products = sqlx::query_as::<_, TopProduct>(
        r"
        SELECT oi.product_id, MAX(oi.name) AS name,
               SUM(oi.quantity)::bigint AS units_sold,
               SUM(oi.line_total) AS revenue
        FROM order_item oi
        JOIN shop_order o ON o.id = oi.order_id
        WHERE o.status <> 'cancelled'
        GROUP BY oi.product_id
        ORDER BY units_sold DESC, revenue DESC
        LIMIT $1
        ",
    )
    .bind(TOP_PRODUCTS)
    .fetch_all(pool)
    .await?;

    let low_stock = sqlx::query_as::<_, LowStockProduct>(
        r"
        SELECT id, name, stock
        FROM product
        WHERE is_active AND stock <= $1
        ORDER BY stock, name
        ",
    )
    .bind(LOW_STOCK_THRESHOLD)
    .fetch_all(pool)
    .await?;

    Ok(DashboardStats {
        totals,
        orders_by_status,
        revenue_by_day,
        top_products,
        low_stock,
    })
}
