//! Integration tests for Kirana.
//!
//! # Running Tests
//!
//! ```bash
//! # Pure checkout, payment and lifecycle tests
//! cargo test -p kirana-integration-tests
//!
//! # Database tests (disposable database, migrated on connect)
//! KIRANA_TEST_DATABASE_URL=postgres://localhost/kirana_test cargo test -p kirana-integration-tests -- --ignored
//!
//! # API tests against a running storefront (migrated and seeded database)
//! KIRANA_TEST_URL=http://localhost:5000 cargo test -p kirana-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - cart merging, validation, coupons and totals
//! - `payments` - Razorpay signatures and the card vault
//! - `order_lifecycle` - status transitions and cancellation rules
//! - `database` - stock, coupon and payment state against `PostgreSQL` (ignored by default)
//! - `api` - HTTP tests against a live server (ignored by default)
//!
//! This library holds the fixtures those tests share.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use kirana_core::{
    CouponId, DiscountType, OrderId, OrderStatus, PaymentMethodKind, PaymentStatus, ProductId,
    UserId,
};
use kirana_storefront::config::PricingConfig;
use kirana_storefront::models::{Coupon, DeliveryInfo, Order, PaymentInfo, Product, ShippingAddress};

/// Base URL of the storefront under test.
#[must_use]
pub fn storefront_url() -> String {
    std::env::var("KIRANA_TEST_URL").unwrap_or_else(|_| "http://localhost:5000".to_owned())
}

/// An active product with the given price and stock.
#[must_use]
pub fn product(id: i32, category: &str, price: Decimal, stock: i32) -> Product {
    let now = Utc::now();
    Product {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        description: String::new(),
        category: category.to_owned(),
        brand: None,
        price,
        mrp: None,
        stock,
        images: vec![format!("https://cdn.example.com/{id}.jpg")],
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// An active, unlimited coupon valid for a day either side of `now`.
#[must_use]
pub fn coupon(code: &str, discount_type: DiscountType, value: Decimal, now: DateTime<Utc>) -> Coupon {
    Coupon {
        id: CouponId::new(1),
        code: code.to_owned(),
        description: None,
        discount_type,
        discount_value: value,
        minimum_order_amount: Decimal::ZERO,
        maximum_discount_amount: None,
        valid_from: now - Duration::days(1),
        valid_until: now + Duration::days(1),
        usage_limit: None,
        usage_limit_per_user: None,
        used_count: 0,
        applicable_categories: Vec::new(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// A ₹250 COD order owned by `user_id`, in the given status.
#[must_use]
pub fn order(user_id: i32, status: OrderStatus) -> Order {
    let now = Utc::now();
    Order {
        id: OrderId::new(1),
        order_number: "ORD-20260301-ABC123".to_owned(),
        user_id: UserId::new(user_id),
        status,
        shipping_address: ShippingAddress {
            full_name: "Asha Rao".to_owned(),
            phone: "9876543210".to_owned(),
            address_line1: "12 MG Road".to_owned(),
            address_line2: None,
            city: "Bengaluru".to_owned(),
            state: "Karnataka".to_owned(),
            postal_code: "560001".to_owned(),
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
        coupon_id: None,
        coupon_code: None,
        subtotal: Decimal::from(250),
        discount: Decimal::ZERO,
        shipping_fee: Decimal::ZERO,
        tax: Decimal::ZERO,
        total: Decimal::from(250),
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

/// ₹49 shipping below ₹499, 5% tax.
#[must_use]
pub fn pricing() -> PricingConfig {
    PricingConfig {
        shipping_flat_rate: Decimal::new(4900, 2),
        free_shipping_threshold: Decimal::new(49_900, 2),
        tax_rate_percent: Decimal::from(5),
    }
}

/// Whole rupees.
#[must_use]
pub fn rupees(amount: i64) -> Decimal {
    Decimal::from(amount)
}
