//! Order types.
//!
//! An order row carries its payment and delivery details as flat columns;
//! they are grouped into [`PaymentInfo`] and [`DeliveryInfo`] via
//! `#[sqlx(flatten)]` so API responses nest them.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kirana_core::{
    CouponId, OrderId, OrderItemId, OrderStatus, PaymentMethodKind, PaymentStatus, ProductId,
    UserId,
};

use super::{ValidationError, optional, required, user::normalise_phone};

/// Where an order is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "India".to_owned()
}

impl ShippingAddress {
    /// Trim every field and check the phone number and PIN code.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` naming the first missing or malformed field.
    pub fn normalised(self) -> Result<Self, ValidationError> {
        let postal_code = required(&self.postal_code, "postal code")?;
        if postal_code.len() != 6 || !postal_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::new("postal code must be 6 digits"));
        }

        Ok(Self {
            full_name: required(&self.full_name, "full name")?,
            phone: normalise_phone(&self.phone)?,
            address_line1: required(&self.address_line1, "address line 1")?,
            address_line2: optional(self.address_line2.as_deref()),
            city: required(&self.city, "city")?,
            state: required(&self.state, "state")?,
            postal_code,
            country: required(&self.country, "country")?,
        })
    }
}

/// Payment columns of an order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentInfo {
    #[sqlx(rename = "payment_method")]
    pub method: PaymentMethodKind,
    #[sqlx(rename = "payment_status")]
    pub status: PaymentStatus,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    #[serde(skip_serializing)]
    pub razorpay_signature: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Delivery columns of an order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DeliveryInfo {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<NaiveDate>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Delivery details an admin may attach when shipping.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryUpdate {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<NaiveDate>,
}

impl DeliveryUpdate {
    /// Trim text fields, dropping blanks.
    #[must_use]
    pub fn normalised(self) -> Self {
        Self {
            carrier: optional(self.carrier.as_deref()),
            tracking_number: optional(self.tracking_number.as_deref()),
            estimated_delivery: self.estimated_delivery,
        }
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    #[sqlx(json)]
    pub shipping_address: ShippingAddress,
    #[sqlx(flatten)]
    pub payment: PaymentInfo,
    pub coupon_id: Option<CouponId>,
    pub coupon_code: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_fee: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    #[sqlx(flatten)]
    pub delivery: DeliveryInfo,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether the order has been paid for.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment.status == PaymentStatus::Paid
    }
}

/// A line of an order, priced at the time of purchase.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub category: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// An order together with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderWithItems {
    /// Pair each order with its lines, keeping the order sequence.
    #[must_use]
    pub fn group(orders: Vec<Order>, items: Vec<OrderItem>) -> Vec<Self> {
        let mut grouped: Vec<Self> = orders
            .into_iter()
            .map(|order| Self {
                order,
                items: Vec::new(),
            })
            .collect();
        for item in items {
            if let Some(entry) = grouped.iter_mut().find(|o| o.order.id == item.order_id) {
                entry.items.push(item);
            }
        }
        grouped
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: " Meera Iyer ".to_owned(),
            phone: "98450 12345".to_owned(),
            address_line1: "12 MG Road".to_owned(),
            address_line2: Some(String::new()),
            city: "Bengaluru".to_owned(),
            state: "Karnataka".to_owned(),
            postal_code: "560001".to_owned(),
            country: default_country(),
        }
    }

    #[test]
    fn test_address_normalised() {
        let addr = address().normalised().unwrap();
        assert_eq!(addr.full_name, "Meera Iyer");
        assert_eq!(addr.phone, "9845012345");
        assert_eq!(addr.address_line2, None);
    }

    #[test]
    fn test_address_rejects_bad_pin() {
        let mut addr = address();
        addr.postal_code = "5600".to_owned();
        assert!(addr.normalised().is_err());
    }

    #[test]
    fn test_address_country_defaults_to_india() {
        let json = r#"{"full_name":"A","phone":"9876543210","address_line1":"x",
            "city":"Pune","state":"MH","postal_code":"411001"}"#;
        let addr: ShippingAddress = serde_json::from_str(json).unwrap();
        assert_eq!(addr.country, "India");
    }

    #[test]
    fn test_delivery_update_drops_blanks() {
        let update = DeliveryUpdate {
            carrier: Some(" Delhivery ".to_owned()),
            tracking_number: Some(" ".to_owned()),
            estimated_delivery: None,
        }
        .normalised();
        assert_eq!(update.carrier.as_deref(), Some("Delhivery"));
        assert_eq!(update.tracking_number, None);
    }
}
