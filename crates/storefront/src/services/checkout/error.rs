//! Checkout error types.

use thiserror::Error;

use kirana_core::{OrderStatus, ProductId};

use crate::db::RepositoryError;
use crate::models::{CouponRejection, ValidationError};
use crate::services::razorpay::RazorpayError;

/// Errors from pricing, order placement and the order lifecycle.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No items in the order.
    #[error("your cart is empty")]
    EmptyOrder,

    /// Quantity outside the per-line range.
    #[error("quantity {quantity} for product {product_id} must be between 1 and {max}")]
    InvalidQuantity {
        product_id: ProductId,
        quantity: i32,
        max: i32,
    },

    /// Product missing or no longer sold.
    #[error("product {0} is not available")]
    ProductUnavailable(ProductId),

    /// Not enough stock, either at validation or at reservation time.
    #[error("insufficient stock for {name}: only {available} left")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        available: i32,
    },

    /// Coupon rejected.
    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    /// Request body failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Order missing or owned by someone else.
    #[error("order not found")]
    OrderNotFound,

    /// Requested status change is not allowed.
    #[error("cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Shopper tried to cancel an order past the point they may.
    #[error("orders that are {0} can no longer be cancelled")]
    NotCancellable(OrderStatus),

    /// Order cannot take an online payment in its current state.
    #[error("order is not awaiting online payment")]
    NotPayable,

    /// Callback references a different gateway order.
    #[error("payment does not belong to this order")]
    PaymentMismatch,

    /// Checkout signature did not verify.
    #[error("payment verification failed")]
    InvalidSignature,

    /// Payment gateway failure.
    #[error("payment gateway error: {0}")]
    Gateway(#[from] RazorpayError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}
