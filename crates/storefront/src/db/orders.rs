//! Order repository.
//!
//! Methods taking `&mut PgConnection` run inside the caller's transaction;
//! the checkout workflow composes them so that an order, its stock
//! reservation and its coupon usage commit or roll back together.

use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use kirana_core::{CouponId, OrderId, OrderStatus, PaymentMethodKind, ProductId, UserId};

use super::{PageRequest, Pagination, RepositoryError};
use crate::models::{DeliveryUpdate, Order, OrderItem, ShippingAddress};

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, shipping_address, \
     payment_method, payment_status, razorpay_order_id, razorpay_payment_id, \
     razorpay_signature, paid_at, coupon_id, coupon_code, subtotal, discount, \
     shipping_fee, tax, total, carrier, tracking_number, estimated_delivery, \
     delivered_at, cancelled_at, notes, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, name, image, category, unit_price, quantity, line_total";

/// Fields of a new order row.
#[derive(Debug)]
pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub user_id: UserId,
    pub shipping_address: &'a ShippingAddress,
    pub payment_method: PaymentMethodKind,
    pub coupon_id: Option<CouponId>,
    pub coupon_code: Option<&'a str>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_fee: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub notes: Option<&'a str>,
}

/// Fields of a new order line.
#[derive(Debug)]
pub struct NewOrderItem<'a> {
    pub product_id: ProductId,
    pub name: &'a str,
    pub image: Option<&'a str>,
    pub category: &'a str,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM shop_order WHERE id = $1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Get an order by the payment gateway's order ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_gateway_order(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM shop_order WHERE razorpay_order_id = $1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(razorpay_order_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Lines of one order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        self.items_for(&[order_id]).await
    }

    /// Lines of several orders, grouped by order then line ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items_for(&self, order_ids: &[OrderId]) -> Result<Vec<OrderItem>, RepositoryError> {
        let ids: Vec<i32> = order_ids.iter().map(OrderId::as_i32).collect();
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM order_item WHERE order_id = ANY($1) ORDER BY order_id, id"
        );
        let items = sqlx::query_as::<_, OrderItem>(&sql)
            .bind(ids)
            .fetch_all(self.pool)
            .await?;
        Ok(items)
    }

    /// List orders newest first, optionally for one user and/or one status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user_id: Option<UserId>,
        status: Option<OrderStatus>,
        page: &PageRequest,
    ) -> Result<(Vec<Order>, Pagination), RepositoryError> {
        let where_clause = "WHERE ($1::int IS NULL OR user_id = $1) \
                            AND ($2::order_status IS NULL OR status = $2)";

        let count_sql = format!("SELECT COUNT(*) FROM shop_order {where_clause}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(user_id)
            .bind(status)
            .fetch_one(self.pool)
            .await?;

        let list_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM shop_order {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        );
        let orders = sqlx::query_as::<_, Order>(&list_sql)
            .bind(user_id)
            .bind(status)
            .bind(i64::from(page.limit()))
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        Ok((orders, page.meta(total)))
    }

    /// Attach the gateway order created for this order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_gateway_order(
        &self,
        id: OrderId,
        razorpay_order_id: &str,
    ) -> Result<Order, RepositoryError> {
        let sql = format!(
            "UPDATE shop_order SET razorpay_order_id = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(razorpay_order_id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Record a successful payment and confirm a pending order.
    ///
    /// Returns `None` if the order was already paid (or does not exist).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_paid(
        &self,
        id: OrderId,
        razorpay_payment_id: &str,
        razorpay_signature: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            r"
            UPDATE shop_order
            SET payment_status = 'paid',
                razorpay_payment_id = $2,
                razorpay_signature = COALESCE($3, razorpay_signature),
                paid_at = NOW(),
                status = CASE WHEN status = 'pending' THEN 'confirmed'::order_status ELSE status END,
                updated_at = NOW()
            WHERE id = $1 AND payment_status <> 'paid'
            RETURNING {ORDER_COLUMNS}
            "
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(razorpay_payment_id)
            .bind(razorpay_signature)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Record a failed payment attempt on an unpaid order.
    ///
    /// Returns `None` if the order was already paid or refunded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_payment_failed(
        &self,
        id: OrderId,
        razorpay_payment_id: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            r"
            UPDATE shop_order
            SET payment_status = 'failed',
                razorpay_payment_id = COALESCE($2, razorpay_payment_id),
                updated_at = NOW()
            WHERE id = $1 AND payment_status IN ('pending', 'failed')
            RETURNING {ORDER_COLUMNS}
            "
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(razorpay_payment_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Mark a paid order as refunded, found by its gateway payment ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_refunded(
        &self,
        razorpay_payment_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            r"
            UPDATE shop_order
            SET payment_status = 'refunded', updated_at = NOW()
            WHERE razorpay_payment_id = $1 AND payment_status = 'paid'
            RETURNING {ORDER_COLUMNS}
            "
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(razorpay_payment_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(order)
    }

    /// Whether an order number is already taken.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn order_number_exists(&self, order_number: &str) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM shop_order WHERE order_number = $1)")
                .bind(order_number)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Insert an order row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order number is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn insert_tx(
        conn: &mut PgConnection,
        order: &NewOrder<'_>,
    ) -> Result<Order, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO shop_order (
                order_number, user_id, shipping_address, payment_method, coupon_id,
                coupon_code, subtotal, discount, shipping_fee, tax, total, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {ORDER_COLUMNS}
            "
        );
        sqlx::query_as::<_, Order>(&sql)
            .bind(order.order_number)
            .bind(order.user_id)
            .bind(Json(order.shipping_address))
            .bind(order.payment_method)
            .bind(order.coupon_id)
            .bind(order.coupon_code)
            .bind(order.subtotal)
            .bind(order.discount)
            .bind(order.shipping_fee)
            .bind(order.tax)
            .bind(order.total)
            .bind(order.notes)
            .fetch_one(conn)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "order number"))
    }

    /// Insert the lines of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert_items_tx(
        conn: &mut PgConnection,
        order_id: OrderId,
        items: &[NewOrderItem<'_>],
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO order_item (
                order_id, product_id, name, image, category, unit_price, quantity, line_total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ITEM_COLUMNS}
            "
        );

        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, OrderItem>(&sql)
                .bind(order_id)
                .bind(item.product_id)
                .bind(item.name)
                .bind(item.image)
                .bind(item.category)
                .bind(item.unit_price)
                .bind(item.quantity)
                .bind(item.line_total)
                .fetch_one(&mut *conn)
                .await?;
            inserted.push(row);
        }
        Ok(inserted)
    }

    /// Take `quantity` units of a product if that many are in stock.
    ///
    /// Returns `false`, changing nothing, when stock is insufficient at
    /// update time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reserve_stock_tx(
        conn: &mut PgConnection,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE product
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            ",
        )
        .bind(product_id)
        .bind(quantity)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Put every unit of an order back into stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn restore_stock_tx(
        conn: &mut PgConnection,
        order_id: OrderId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE product p
            SET stock = p.stock + oi.quantity, updated_at = NOW()
            FROM order_item oi
            WHERE oi.order_id = $1 AND p.id = oi.product_id
            ",
        )
        .bind(order_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Load an order and lock its row until the transaction ends.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_tx(
        conn: &mut PgConnection,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM shop_order WHERE id = $1 FOR UPDATE");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(order)
    }

    /// Move an order to `status`, stamping the matching timestamps.
    ///
    /// Delivery fields are only overwritten when given. Delivering a
    /// cash-on-delivery order also marks it paid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_status_tx(
        conn: &mut PgConnection,
        id: OrderId,
        status: OrderStatus,
        delivery: &DeliveryUpdate,
    ) -> Result<Order, RepositoryError> {
        let sql = format!(
            r"
            UPDATE shop_order
            SET status = $2,
                carrier = COALESCE($3, carrier),
                tracking_number = COALESCE($4, tracking_number),
                estimated_delivery = COALESCE($5, estimated_delivery),
                delivered_at = CASE WHEN $2 = 'delivered'::order_status THEN NOW() ELSE delivered_at END,
                cancelled_at = CASE WHEN $2 = 'cancelled'::order_status THEN NOW() ELSE cancelled_at END,
                payment_status = CASE
                    WHEN $2 = 'delivered'::order_status AND payment_method = 'cod'
                    THEN 'paid'::payment_status
                    ELSE payment_status
                END,
                paid_at = CASE
                    WHEN $2 = 'delivered'::order_status AND payment_method = 'cod'
                    THEN COALESCE(paid_at, NOW())
                    ELSE paid_at
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        );
        sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(status)
            .bind(delivery.carrier.as_deref())
            .bind(delivery.tracking_number.as_deref())
            .bind(delivery.estimated_delivery)
            .fetch_optional(conn)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}
