//! Checkout and the order lifecycle.
//!
//! [`OrderService`] owns the one workflow in the storefront that must stay
//! consistent under concurrency: placing an order inserts the order, takes
//! stock with guarded updates, redeems the coupon and trims the cart inside
//! a single transaction. Payment-gateway calls and emails happen only after
//! that transaction commits and never undo it.

mod error;
pub mod pricing;

pub use error::CheckoutError;
pub use pricing::{
    CouponApplication, ItemRequest, MAX_LINE_QUANTITY, OrderLine, OrderTotals, lock_order,
    merge_items, price_order, validate_lines,
};

use chrono::{NaiveDate, Utc};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use kirana_core::{
    CURRENCY_CODE, OrderId, OrderStatus, PaymentMethodKind, PaymentStatus, UserId,
    to_minor_units,
};

use crate::config::PricingConfig;
use crate::db::orders::{NewOrder, NewOrderItem};
use crate::db::{
    CartRepository, CouponRepository, OrderRepository, ProductRepository, RepositoryError,
    UserRepository,
};
use crate::models::coupon::normalise_code;
use crate::models::{
    Coupon, CouponRejection, DeliveryUpdate, Order, OrderWithItems, ShippingAddress,
    ValidationError,
};
use crate::services::email::{EmailError, EmailService};
use crate::services::razorpay::{RazorpayClient, RazorpayError, WebhookEvent};

/// Longest order note accepted.
const MAX_NOTES_LEN: usize = 500;

/// Attempts at finding an unused order number.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

const ORDER_NUMBER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    /// Items to buy; when empty the user's cart is used.
    #[serde(default)]
    pub items: Vec<ItemRequest>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethodKind,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
}

/// What the browser needs to open the gateway checkout.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub key_id: String,
    pub razorpay_order_id: String,
    /// Amount in paise.
    pub amount: i64,
    pub currency: &'static str,
    pub order_number: String,
}

/// Result of placing an order.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: OrderWithItems,
    /// Present for online payments once the gateway order exists.
    pub payment: Option<PaymentIntent>,
}

/// Price preview of a cart or item list.
#[derive(Debug, Clone, Serialize)]
pub struct Quote {
    pub coupon_code: Option<String>,
    #[serde(flatten)]
    pub totals: OrderTotals,
}

/// Who is changing an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// The shopper who placed it.
    Customer(UserId),
    /// A store administrator.
    Admin,
}

/// What a webhook delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Paid(OrderId),
    Failed(OrderId),
    Refunded(OrderId),
    /// Unknown event, unknown order, or nothing to change.
    Ignored,
}

#[derive(Debug, Clone, Copy)]
enum OrderEmail {
    Confirmation,
    StatusUpdate,
}

#[derive(Debug, Error)]
enum NotifyError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error("order or user not found")]
    Missing,
}

/// Order placement, payment and lifecycle.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    razorpay: &'a RazorpayClient,
    email: Option<&'a EmailService>,
    pricing: &'a PricingConfig,
}

impl<'a> OrderService<'a> {
    /// Create a new order service.
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        razorpay: &'a RazorpayClient,
        email: Option<&'a EmailService>,
        pricing: &'a PricingConfig,
    ) -> Self {
        Self {
            pool,
            razorpay,
            email,
            pricing,
        }
    }

    /// Price items (or the cart) with an optional coupon, without ordering.
    ///
    /// # Errors
    ///
    /// Returns the same validation and coupon errors as [`Self::place_order`].
    #[instrument(skip(self, items), fields(user_id = %user_id))]
    pub async fn quote(
        &self,
        user_id: UserId,
        items: &[ItemRequest],
        coupon_code: Option<&str>,
    ) -> Result<Quote, CheckoutError> {
        let lines = self.load_lines(user_id, items).await?;
        let coupon = self.load_coupon(user_id, coupon_code).await?;
        let totals = price_order(&lines, coupon_application(coupon.as_ref()), self.pricing)?;

        Ok(Quote {
            coupon_code: coupon.map(|(c, _)| c.code),
            totals,
        })
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` for invalid input, unavailable products,
    /// insufficient stock (checked again atomically at reservation time),
    /// rejected or exhausted coupons, and database failures. Gateway
    /// failures after the order is committed are logged, not returned.
    #[instrument(skip(self, request), fields(user_id = %user_id, payment_method = %request.payment_method))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        request: PlaceOrderRequest,
    ) -> Result<PlacedOrder, CheckoutError> {
        let address = request.shipping_address.normalised()?;
        let notes = normalise_notes(request.notes.as_deref())?;

        let lines = self.load_lines(user_id, &request.items).await?;
        let coupon = self
            .load_coupon(user_id, request.coupon_code.as_deref())
            .await?;
        let totals = price_order(&lines, coupon_application(coupon.as_ref()), self.pricing)?;
        let order_number = self.unused_order_number().await?;

        let mut tx = self.pool.begin().await?;

        let order = OrderRepository::insert_tx(
            &mut tx,
            &NewOrder {
                order_number: &order_number,
                user_id,
                shipping_address: &address,
                payment_method: request.payment_method,
                coupon_id: coupon.as_ref().map(|(c, _)| c.id),
                coupon_code: coupon.as_ref().map(|(c, _)| c.code.as_str()),
                subtotal: totals.subtotal,
                discount: totals.discount,
                shipping_fee: totals.shipping_fee,
                tax: totals.tax,
                total: totals.total,
                notes: notes.as_deref(),
            },
        )
        .await?;

        let new_items: Vec<NewOrderItem<'_>> = lines
            .iter()
            .map(|line| NewOrderItem {
                product_id: line.product.id,
                name: &line.product.name,
                image: line.product.primary_image(),
                category: &line.product.category,
                unit_price: line.product.price,
                quantity: line.quantity,
                line_total: line.line_total(),
            })
            .collect();
        let items = OrderRepository::insert_items_tx(&mut tx, order.id, &new_items).await?;

        for line in lock_order(&lines) {
            if !OrderRepository::reserve_stock_tx(&mut tx, line.product.id, line.quantity).await? {
                tx.rollback().await?;
                return Err(self.stock_conflict(line).await);
            }
        }

        if let Some((coupon, _)) = &coupon
            && let Err(rejection) =
                CouponRepository::redeem_tx(&mut tx, coupon.id, user_id, order.id, totals.discount)
                    .await?
        {
            tx.rollback().await?;
            return Err(rejection.into());
        }

        let product_ids: Vec<_> = lines.iter().map(|l| l.product.id).collect();
        CartRepository::remove_products_tx(&mut tx, user_id, &product_ids).await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "Order placed"
        );

        let (order, payment) = match request.payment_method {
            PaymentMethodKind::Razorpay => match self.open_gateway_order(&order).await {
                Ok((order, intent)) => (order, Some(intent)),
                Err(e) => {
                    warn!(
                        order_id = %order.id,
                        error = %e,
                        "Gateway order creation failed; client may retry"
                    );
                    (order, None)
                }
            },
            PaymentMethodKind::Cod => {
                self.notify(order.id, OrderEmail::Confirmation);
                (order, None)
            }
        };

        Ok(PlacedOrder {
            order: OrderWithItems { order, items },
            payment,
        })
    }

    /// Create (or reuse) the gateway order for an unpaid online order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` for someone else's order,
    /// `CheckoutError::NotPayable` for COD, paid or cancelled orders and
    /// `CheckoutError::Gateway` when Razorpay fails.
    #[instrument(skip(self), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn create_payment(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<PaymentIntent, CheckoutError> {
        let order = self.owned_order(user_id, order_id).await?;

        if order.payment.method != PaymentMethodKind::Razorpay
            || order.status == OrderStatus::Cancelled
            || !matches!(
                order.payment.status,
                PaymentStatus::Pending | PaymentStatus::Failed
            )
        {
            return Err(CheckoutError::NotPayable);
        }

        if let Some(gateway_order_id) = &order.payment.razorpay_order_id {
            return self.intent_for(&order, gateway_order_id.clone());
        }

        let (_, intent) = self.open_gateway_order(&order).await?;
        Ok(intent)
    }

    /// Verify the checkout callback and mark the order paid.
    ///
    /// Already-paid orders are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::PaymentMismatch` if the gateway order differs,
    /// `CheckoutError::NotPayable` for cancelled orders and
    /// `CheckoutError::InvalidSignature` (after recording the failure) when
    /// the signature does not verify.
    #[instrument(skip(self, signature), fields(user_id = %user_id, order_id = %order_id))]
    pub async fn verify_payment(
        &self,
        user_id: UserId,
        order_id: OrderId,
        razorpay_order_id: &str,
        razorpay_payment_id: &str,
        signature: &str,
    ) -> Result<Order, CheckoutError> {
        let order = self.owned_order(user_id, order_id).await?;

        if order.is_paid() {
            return Ok(order);
        }
        if order.payment.razorpay_order_id.as_deref() != Some(razorpay_order_id) {
            return Err(CheckoutError::PaymentMismatch);
        }
        if order.status == OrderStatus::Cancelled {
            return Err(CheckoutError::NotPayable);
        }

        if let Err(e) =
            self.razorpay
                .verify_payment_signature(razorpay_order_id, razorpay_payment_id, signature)
        {
            warn!(error = %e, "Payment signature rejected");
            OrderRepository::new(self.pool)
                .mark_payment_failed(order.id, Some(razorpay_payment_id))
                .await?;
            return Err(CheckoutError::InvalidSignature);
        }

        let repo = OrderRepository::new(self.pool);
        match repo
            .mark_paid(order.id, razorpay_payment_id, Some(signature))
            .await?
        {
            Some(paid) => {
                info!(order_id = %paid.id, "Payment verified");
                self.notify(paid.id, OrderEmail::Confirmation);
                Ok(paid)
            }
            // Paid concurrently, e.g. by the webhook
            None => repo.get(order.id).await?.ok_or(CheckoutError::OrderNotFound),
        }
    }

    /// Cancel an order and put its stock back.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` for someone else's order,
    /// `CheckoutError::NotCancellable` when a customer is past the
    /// cancellable stages and `CheckoutError::InvalidTransition` when even
    /// an admin may not cancel.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: OrderId, actor: Actor) -> Result<Order, CheckoutError> {
        let mut tx = self.pool.begin().await?;

        let order = OrderRepository::lock_tx(&mut tx, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        check_cancellation(&order, actor)?;

        OrderRepository::restore_stock_tx(&mut tx, order.id).await?;
        let cancelled = OrderRepository::set_status_tx(
            &mut tx,
            order.id,
            OrderStatus::Cancelled,
            &DeliveryUpdate::default(),
        )
        .await?;

        tx.commit().await?;

        info!(order_id = %cancelled.id, ?actor, "Order cancelled");
        self.notify(cancelled.id, OrderEmail::StatusUpdate);
        Ok(cancelled)
    }

    /// Move an order along its lifecycle (admin).
    ///
    /// Cancelling restocks; shipping may attach carrier details.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` for unknown orders and
    /// `CheckoutError::InvalidTransition` for illegal status changes.
    #[instrument(skip(self, delivery), fields(order_id = %order_id, status = %status))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        delivery: DeliveryUpdate,
    ) -> Result<Order, CheckoutError> {
        if status == OrderStatus::Cancelled {
            return self.cancel_order(order_id, Actor::Admin).await;
        }

        let mut tx = self.pool.begin().await?;

        let order = OrderRepository::lock_tx(&mut tx, order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound)?;
        if !order.status.can_transition_to(status) {
            return Err(CheckoutError::InvalidTransition {
                from: order.status,
                to: status,
            });
        }

        let updated =
            OrderRepository::set_status_tx(&mut tx, order.id, status, &delivery.normalised())
                .await?;
        tx.commit().await?;

        info!(order_id = %updated.id, from = %order.status, to = %status, "Order status updated");
        self.notify(updated.id, OrderEmail::StatusUpdate);
        Ok(updated)
    }

    /// Apply a verified webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Repository` on database failure only;
    /// unknown events and orders are ignored.
    #[instrument(skip(self, event), fields(event = %event.event))]
    pub async fn handle_webhook(&self, event: WebhookEvent) -> Result<WebhookOutcome, CheckoutError> {
        let repo = OrderRepository::new(self.pool);

        let outcome = match event.event.as_str() {
            "payment.captured" | "order.paid" => {
                let Some((order, payment_id)) = self.webhook_order(&event).await? else {
                    return Ok(WebhookOutcome::Ignored);
                };
                match repo.mark_paid(order.id, &payment_id, None).await? {
                    Some(paid) => {
                        self.notify(paid.id, OrderEmail::Confirmation);
                        WebhookOutcome::Paid(paid.id)
                    }
                    None => WebhookOutcome::Ignored,
                }
            }
            "payment.failed" => {
                let Some((order, payment_id)) = self.webhook_order(&event).await? else {
                    return Ok(WebhookOutcome::Ignored);
                };
                repo.mark_payment_failed(order.id, Some(&payment_id))
                    .await?
                    .map_or(WebhookOutcome::Ignored, |o| WebhookOutcome::Failed(o.id))
            }
            "refund.processed" => match &event.payload.refund {
                Some(refund) => repo
                    .mark_refunded(&refund.entity.payment_id)
                    .await?
                    .map_or(WebhookOutcome::Ignored, |o| WebhookOutcome::Refunded(o.id)),
                None => WebhookOutcome::Ignored,
            },
            _ => WebhookOutcome::Ignored,
        };

        info!(?outcome, "Webhook processed");
        Ok(outcome)
    }

    async fn webhook_order(
        &self,
        event: &WebhookEvent,
    ) -> Result<Option<(Order, String)>, CheckoutError> {
        let Some(payment) = &event.payload.payment else {
            return Ok(None);
        };
        let Some(gateway_order_id) = &payment.entity.order_id else {
            return Ok(None);
        };

        let order = OrderRepository::new(self.pool)
            .get_by_gateway_order(gateway_order_id)
            .await?;
        if order.is_none() {
            warn!(%gateway_order_id, "Webhook for unknown gateway order");
        }
        Ok(order.map(|o| (o, payment.entity.id.clone())))
    }

    async fn owned_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order, CheckoutError> {
        OrderRepository::new(self.pool)
            .get(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(CheckoutError::OrderNotFound)
    }

    async fn load_lines(
        &self,
        user_id: UserId,
        items: &[ItemRequest],
    ) -> Result<Vec<OrderLine>, CheckoutError> {
        let requested = if items.is_empty() {
            let cart: Vec<ItemRequest> = CartRepository::new(self.pool)
                .lines(user_id)
                .await?
                .into_iter()
                .map(|l| ItemRequest {
                    product_id: l.product_id,
                    quantity: l.quantity,
                })
                .collect();
            merge_items(&cart)?
        } else {
            merge_items(items)?
        };

        let ids: Vec<_> = requested.iter().map(|(id, _)| *id).collect();
        let products = ProductRepository::new(self.pool).get_many(&ids).await?;
        validate_lines(&requested, products)
    }

    async fn load_coupon(
        &self,
        user_id: UserId,
        code: Option<&str>,
    ) -> Result<Option<(Coupon, i64)>, CheckoutError> {
        let Some(code) = code.map(normalise_code).filter(|c| !c.is_empty()) else {
            return Ok(None);
        };

        let coupons = CouponRepository::new(self.pool);
        let coupon = coupons
            .get_by_code(&code)
            .await?
            .ok_or(CouponRejection::NotFound)?;
        let used = coupons.user_usage_count(coupon.id, user_id).await?;
        Ok(Some((coupon, used)))
    }

    async fn unused_order_number(&self) -> Result<String, CheckoutError> {
        let repo = OrderRepository::new(self.pool);
        let today = Utc::now().date_naive();
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let candidate = generate_order_number(today);
            if !repo.order_number_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(RepositoryError::Conflict("could not allocate an order number".to_owned()).into())
    }

    async fn stock_conflict(&self, line: &OrderLine) -> CheckoutError {
        let available = ProductRepository::new(self.pool)
            .get(line.product.id)
            .await
            .ok()
            .flatten()
            .map_or(0, |p| p.stock.max(0));
        CheckoutError::InsufficientStock {
            product_id: line.product.id,
            name: line.product.name.clone(),
            available,
        }
    }

    async fn open_gateway_order(&self, order: &Order) -> Result<(Order, PaymentIntent), CheckoutError> {
        let gateway_order = self
            .razorpay
            .create_order(
                order.total,
                &order.order_number,
                &[("order_id", order.id.to_string())],
            )
            .await?;

        let order = OrderRepository::new(self.pool)
            .set_gateway_order(order.id, &gateway_order.id)
            .await?;
        let intent = self.intent_for(&order, gateway_order.id)?;
        Ok((order, intent))
    }

    fn intent_for(&self, order: &Order, razorpay_order_id: String) -> Result<PaymentIntent, CheckoutError> {
        Ok(PaymentIntent {
            key_id: self.razorpay.key_id().to_owned(),
            razorpay_order_id,
            amount: to_minor_units(order.total).map_err(RazorpayError::from)?,
            currency: CURRENCY_CODE,
            order_number: order.order_number.clone(),
        })
    }

    fn notify(&self, order_id: OrderId, kind: OrderEmail) {
        let Some(email) = self.email.cloned() else {
            return;
        };
        let pool = self.pool.clone();
        tokio::spawn(async move {
            if let Err(e) = send_order_email(&pool, &email, order_id, kind).await {
                warn!(order_id = %order_id, ?kind, error = %e, "Failed to send order email");
            }
        });
    }
}

async fn send_order_email(
    pool: &PgPool,
    email: &EmailService,
    order_id: OrderId,
    kind: OrderEmail,
) -> Result<(), NotifyError> {
    let orders = OrderRepository::new(pool);
    let order = orders.get(order_id).await?.ok_or(NotifyError::Missing)?;
    let user = UserRepository::new(pool)
        .get_by_id(order.user_id)
        .await?
        .ok_or(NotifyError::Missing)?;

    match kind {
        OrderEmail::Confirmation => {
            let items = orders.items(order.id).await?;
            email
                .send_order_confirmation(
                    user.email.as_str(),
                    &user.name,
                    &OrderWithItems { order, items },
                )
                .await?;
        }
        OrderEmail::StatusUpdate => {
            email
                .send_order_status(user.email.as_str(), &user.name, &order)
                .await?;
        }
    }
    Ok(())
}

fn coupon_application(coupon: Option<&(Coupon, i64)>) -> Option<CouponApplication<'_>> {
    coupon.map(|(coupon, used)| CouponApplication {
        coupon,
        user_usage_count: *used,
        now: Utc::now(),
    })
}

fn normalise_notes(notes: Option<&str>) -> Result<Option<String>, ValidationError> {
    let notes = notes.map(str::trim).filter(|n| !n.is_empty());
    if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
        return Err(ValidationError(format!(
            "notes must be at most {MAX_NOTES_LEN} characters"
        )));
    }
    Ok(notes.map(str::to_owned))
}

/// Decide whether `actor` may cancel `order`.
///
/// # Errors
///
/// Returns `CheckoutError::OrderNotFound` when a customer targets another
/// user's order, `CheckoutError::NotCancellable` when a customer is too
/// late and `CheckoutError::InvalidTransition` when the order is already
/// shipped, delivered or cancelled.
pub fn check_cancellation(order: &Order, actor: Actor) -> Result<(), CheckoutError> {
    if let Actor::Customer(user_id) = actor {
        if order.user_id != user_id {
            return Err(CheckoutError::OrderNotFound);
        }
        if !order.status.is_customer_cancellable() {
            return Err(CheckoutError::NotCancellable(order.status));
        }
    }
    if !order.status.can_transition_to(OrderStatus::Cancelled) {
        return Err(CheckoutError::InvalidTransition {
            from: order.status,
            to: OrderStatus::Cancelled,
        });
    }
    Ok(())
}

/// `ORD-YYYYMMDD-XXXXXX` with six random upper-case letters or digits.
#[must_use]
pub fn generate_order_number(date: NaiveDate) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .filter_map(|_| ORDER_NUMBER_CHARSET.choose(&mut rng))
        .map(|&b| char::from(b))
        .collect();
    format!("ORD-{}-{suffix}", date.format("%Y%m%d"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::DateTime;
    use rust_decimal::Decimal;

    use kirana_core::CouponId;

    use super::*;
    use crate::models::{DeliveryInfo, PaymentInfo};

    fn order(status: OrderStatus, user: i32) -> Order {
        let now: DateTime<Utc> = Utc::now();
        Order {
            id: OrderId::new(1),
            order_number: "ORD-20260101-AAAAAA".to_owned(),
            user_id: UserId::new(user),
            status,
            shipping_address: ShippingAddress {
                full_name: "A".to_owned(),
                phone: "9876543210".to_owned(),
                address_line1: "x".to_owned(),
                address_line2: None,
                city: "Pune".to_owned(),
                state: "MH".to_owned(),
                postal_code: "411001".to_owned(),
                country: "India".to_owned(),
            },
            payment: PaymentInfo {
                method: PaymentMethodKind::Cod,
                status: PaymentStatus::Pending,
                razorpay_order_id: None,
                razorpay_payment_id: None,
                razorpay_signature: None,
                paid_at: None,
            },
            coupon_id: None::<CouponId>,
            coupon_code: None,
            subtotal: Decimal::from(100),
            discount: Decimal::ZERO,
            shipping_fee: Decimal::from(49),
            tax: Decimal::ZERO,
            total: Decimal::from(149),
            delivery: DeliveryInfo {
                carrier: None,
                tracking_number: None,
                estimated_delivery: None,
                delivered_at: None,
            },
            cancelled_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_order_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let number = generate_order_number(date);
        assert!(number.starts_with("ORD-20260309-"));
        let suffix = number.trim_start_matches("ORD-20260309-");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_customer_can_cancel_own_pending_order() {
        let o = order(OrderStatus::Pending, 7);
        assert!(check_cancellation(&o, Actor::Customer(UserId::new(7))).is_ok());
    }

    #[test]
    fn test_customer_cannot_cancel_others_order() {
        let o = order(OrderStatus::Pending, 7);
        assert!(matches!(
            check_cancellation(&o, Actor::Customer(UserId::new(8))),
            Err(CheckoutError::OrderNotFound)
        ));
    }

    #[test]
    fn test_customer_cannot_cancel_processing_order() {
        let o = order(OrderStatus::Processing, 7);
        assert!(matches!(
            check_cancellation(&o, Actor::Customer(UserId::new(7))),
            Err(CheckoutError::NotCancellable(OrderStatus::Processing))
        ));
        assert!(check_cancellation(&o, Actor::Admin).is_ok());
    }

    #[test]
    fn test_nobody_cancels_shipped_order() {
        let o = order(OrderStatus::Shipped, 7);
        assert!(matches!(
            check_cancellation(&o, Actor::Admin),
            Err(CheckoutError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_normalise_notes() {
        assert_eq!(normalise_notes(Some("  ")).unwrap(), None);
        assert_eq!(
            normalise_notes(Some(" leave at door ")).unwrap().as_deref(),
            Some("leave at door")
        );
        assert!(normalise_notes(Some(&"x".repeat(MAX_NOTES_LEN + 1))).is_err());
    }
}
