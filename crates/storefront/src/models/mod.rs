//! Domain models for the storefront.
//!
//! Row types derive `sqlx::FromRow` and serialize straight into API
//! responses. Input types derive `Deserialize` and carry a `validate` method
//! that handlers call before touching the database.

pub mod banner;
pub mod coupon;
pub mod order;
pub mod payment_method;
pub mod product;
pub mod session;
pub mod user;

use thiserror::Error;

pub use banner::{Banner, BannerInput};
pub use coupon::{Coupon, CouponContext, CouponInput, CouponLine, CouponRejection};
pub use order::{DeliveryInfo, DeliveryUpdate, Order, OrderItem, OrderWithItems, PaymentInfo, ShippingAddress};
pub use payment_method::{CardDetails, NewPaymentMethod, PaymentMethod};
pub use product::{Product, ProductInput};
pub use session::CurrentUser;
pub use user::{ProfileUpdate, User};

/// A client-supplied value failed validation.
///
/// The message is shown to the client as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Trim a required text field, rejecting blank values.
pub(crate) fn required(value: &str, field: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(format!("{field} is required")));
    }
    Ok(trimmed.to_owned())
}

/// Trim an optional text field, mapping blank values to `None`.
pub(crate) fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
