//! Checkout pricing from a raw item list to the amount sent to the gateway.
//!
//! These run without a database: products and coupons are built in memory
//! and fed through the same functions order placement uses.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use rust_decimal::Decimal;

use kirana_core::{DiscountType, ProductId, to_minor_units};
use kirana_integration_tests::{coupon, pricing, product, rupees};
use kirana_storefront::models::CouponRejection;
use kirana_storefront::services::checkout::{
    CheckoutError, CouponApplication, ItemRequest, OrderLine, merge_items, price_order,
    validate_lines,
};

fn item(id: i32, quantity: i32) -> ItemRequest {
    ItemRequest {
        product_id: ProductId::new(id),
        quantity,
    }
}

fn lines(items: &[ItemRequest]) -> Result<Vec<OrderLine>, CheckoutError> {
    let catalog = vec![
        product(1, "staples", rupees(120), 5),
        product(2, "snacks", rupees(45), 20),
        product(3, "staples", rupees(499), 2),
    ];
    let merged = merge_items(items)?;
    validate_lines(&merged, catalog)
}

#[test]
fn test_category_coupon_with_shipping_and_tax() {
    let now = Utc::now();
    let mut c = coupon("STAPLES10", DiscountType::Percentage, rupees(10), now);
    c.applicable_categories = vec!["staples".to_owned()];

    let lines = lines(&[item(1, 2), item(2, 3), item(1, 1)]).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].quantity, 3);

    let totals = price_order(
        &lines,
        Some(CouponApplication {
            coupon: &c,
            user_usage_count: 0,
            now,
        }),
        &pricing(),
    )
    .unwrap();

    // 3 × 120 + 3 × 45
    assert_eq!(totals.subtotal, rupees(495));
    // 10% of the staples line only
    assert_eq!(totals.discount, rupees(36));
    // 459 is below the free-shipping threshold
    assert_eq!(totals.shipping_fee, rupees(49));
    assert_eq!(totals.tax, Decimal::new(2295, 2));
    assert_eq!(totals.total, Decimal::new(53_095, 2));
    assert_eq!(to_minor_units(totals.total).unwrap(), 53_095);
}

#[test]
fn test_free_shipping_at_threshold() {
    let lines = lines(&[item(3, 1)]).unwrap();
    let totals = price_order(&lines, None, &pricing()).unwrap();

    assert_eq!(totals.shipping_fee, Decimal::ZERO);
    assert_eq!(totals.tax, Decimal::new(2495, 2));
    assert_eq!(totals.total, Decimal::new(52_395, 2));
}

#[test]
fn test_discount_that_drops_below_threshold_brings_back_shipping() {
    let now = Utc::now();
    let c = coupon("FLAT20", DiscountType::Fixed, rupees(20), now);

    let lines = lines(&[item(3, 1)]).unwrap();
    let totals = price_order(
        &lines,
        Some(CouponApplication {
            coupon: &c,
            user_usage_count: 0,
            now,
        }),
        &pricing(),
    )
    .unwrap();

    assert_eq!(totals.discount, rupees(20));
    assert_eq!(totals.shipping_fee, rupees(49));
}

#[test]
fn test_fixed_coupon_capped_at_eligible_amount() {
    let now = Utc::now();
    let c = coupon("BIGFLAT", DiscountType::Fixed, rupees(100), now);

    let lines = lines(&[item(2, 1)]).unwrap();
    let totals = price_order(
        &lines,
        Some(CouponApplication {
            coupon: &c,
            user_usage_count: 0,
            now,
        }),
        &pricing(),
    )
    .unwrap();

    assert_eq!(totals.discount, rupees(45));
    assert_eq!(totals.tax, Decimal::ZERO);
    assert_eq!(totals.total, rupees(49));
}

#[test]
fn test_merged_quantity_checked_against_stock() {
    let err = lines(&[item(1, 3), item(1, 3)]).unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::InsufficientStock { available: 5, .. }
    ));
}

#[test]
fn test_merged_quantity_checked_against_line_limit() {
    let err = lines(&[item(2, 6), item(2, 5)]).unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::InvalidQuantity { quantity: 11, .. }
    ));
}

#[test]
fn test_unknown_and_inactive_products_rejected() {
    assert!(matches!(
        lines(&[item(99, 1)]),
        Err(CheckoutError::ProductUnavailable(_))
    ));

    let mut hidden = product(4, "snacks", rupees(10), 10);
    hidden.is_active = false;
    let merged = merge_items(&[item(4, 1)]).unwrap();
    assert!(matches!(
        validate_lines(&merged, vec![hidden]),
        Err(CheckoutError::ProductUnavailable(_))
    ));
}

#[test]
fn test_empty_order_rejected() {
    assert!(matches!(lines(&[]), Err(CheckoutError::EmptyOrder)));
}

#[test]
fn test_coupon_rejections_surface_from_pricing() {
    let now = Utc::now();
    let lines = lines(&[item(2, 2)]).unwrap();

    let mut exhausted = coupon("GONE", DiscountType::Fixed, rupees(10), now);
    exhausted.usage_limit = Some(3);
    exhausted.used_count = 3;

    let mut per_user = coupon("ONCE", DiscountType::Fixed, rupees(10), now);
    per_user.usage_limit_per_user = Some(1);

    let mut minimum = coupon("MIN500", DiscountType::Fixed, rupees(10), now);
    minimum.minimum_order_amount = rupees(500);

    let mut wrong_category = coupon("DAIRY", DiscountType::Percentage, rupees(5), now);
    wrong_category.applicable_categories = vec!["dairy".to_owned()];

    let cases = [
        (&exhausted, 0, CouponRejection::Exhausted),
        (&per_user, 1, CouponRejection::UserLimitReached),
        (
            &minimum,
            0,
            CouponRejection::MinimumNotMet {
                minimum: rupees(500),
            },
        ),
        (&wrong_category, 0, CouponRejection::NotApplicable),
    ];

    for (c, used, expected) in cases {
        let err = price_order(
            &lines,
            Some(CouponApplication {
                coupon: c,
                user_usage_count: used,
                now,
            }),
            &pricing(),
        )
        .unwrap_err();
        match err {
            CheckoutError::Coupon(rejection) => assert_eq!(rejection, expected, "{}", c.code),
            other => panic!("{}: unexpected error {other:?}", c.code),
        }
    }
}
