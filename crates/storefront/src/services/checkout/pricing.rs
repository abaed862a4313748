//! Order pricing.
//!
//! Everything here is pure: it takes products as loaded from the database
//! and returns either validated lines or totals. Prices always come from the
//! product rows, never from the client.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kirana_core::{ProductId, round_money};

use super::CheckoutError;
use crate::config::PricingConfig;
use crate::models::{Coupon, CouponContext, CouponLine, Product};

/// Most units of one product per order (and per cart line).
pub const MAX_LINE_QUANTITY: i32 = 10;

/// One requested item.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ItemRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A validated line: a live product and how many to buy.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product: Product,
    pub quantity: i32,
}

impl OrderLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        round_money(self.product.price * Decimal::from(self.quantity))
    }
}

/// Money breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_fee: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// A coupon to apply, with the facts needed to evaluate it.
#[derive(Debug, Clone, Copy)]
pub struct CouponApplication<'a> {
    pub coupon: &'a Coupon,
    pub user_usage_count: i64,
    pub now: DateTime<Utc>,
}

/// Merge repeated product IDs and check quantities.
///
/// The first occurrence decides the line's position.
///
/// # Errors
///
/// Returns `CheckoutError::EmptyOrder` for no items and
/// `CheckoutError::InvalidQuantity` when any requested or merged quantity
/// falls outside `1..=MAX_LINE_QUANTITY`.
pub fn merge_items(items: &[ItemRequest]) -> Result<Vec<(ProductId, i32)>, CheckoutError> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyOrder);
    }

    let mut merged: Vec<(ProductId, i32)> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity < 1 {
            return Err(invalid_quantity(item.product_id, item.quantity));
        }
        match merged.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, quantity)) => *quantity = quantity.saturating_add(item.quantity),
            None => merged.push((item.product_id, item.quantity)),
        }
    }

    if let Some(&(product_id, quantity)) = merged.iter().find(|(_, q)| *q > MAX_LINE_QUANTITY) {
        return Err(invalid_quantity(product_id, quantity));
    }

    Ok(merged)
}

const fn invalid_quantity(product_id: ProductId, quantity: i32) -> CheckoutError {
    CheckoutError::InvalidQuantity {
        product_id,
        quantity,
        max: MAX_LINE_QUANTITY,
    }
}

/// Pair merged items with their products and check availability.
///
/// # Errors
///
/// Returns `CheckoutError::ProductUnavailable` for missing or inactive
/// products and `CheckoutError::InsufficientStock` when stock is short.
pub fn validate_lines(
    requested: &[(ProductId, i32)],
    mut products: Vec<Product>,
) -> Result<Vec<OrderLine>, CheckoutError> {
    let mut lines = Vec::with_capacity(requested.len());

    for &(product_id, quantity) in requested {
        let index = products
            .iter()
            .position(|p| p.id == product_id)
            .ok_or(CheckoutError::ProductUnavailable(product_id))?;
        let product = products.swap_remove(index);

        if !product.is_active {
            return Err(CheckoutError::ProductUnavailable(product_id));
        }
        if !product.has_stock_for(quantity) {
            return Err(CheckoutError::InsufficientStock {
                product_id,
                name: product.name,
                available: product.stock.max(0),
            });
        }

        lines.push(OrderLine { product, quantity });
    }

    Ok(lines)
}

/// Lines in ascending product ID order.
///
/// Stock rows are locked in this order so that concurrent orders over the
/// same products queue on each other instead of deadlocking.
#[must_use]
pub fn lock_order(lines: &[OrderLine]) -> Vec<&OrderLine> {
    let mut sorted: Vec<&OrderLine> = lines.iter().collect();
    sorted.sort_by_key(|line| line.product.id.as_i32());
    sorted
}

/// Compute the totals of an order.
///
/// Shipping is free once the discounted subtotal reaches the threshold;
/// tax is charged on the discounted subtotal.
///
/// # Errors
///
/// Returns `CheckoutError::Coupon` when the coupon does not apply.
pub fn price_order(
    lines: &[OrderLine],
    coupon: Option<CouponApplication<'_>>,
    rules: &PricingConfig,
) -> Result<OrderTotals, CheckoutError> {
    let subtotal: Decimal = lines.iter().map(OrderLine::line_total).sum();

    let discount = match coupon {
        Some(application) => {
            let coupon_lines: Vec<CouponLine<'_>> = lines
                .iter()
                .map(|l| CouponLine {
                    category: &l.product.category,
                    amount: l.line_total(),
                })
                .collect();
            let ctx = CouponContext {
                now: application.now,
                lines: &coupon_lines,
                user_usage_count: application.user_usage_count,
            };
            application.coupon.evaluate(&ctx)?.min(subtotal)
        }
        None => Decimal::ZERO,
    };

    let discounted = subtotal - discount;
    let shipping_fee = if lines.is_empty() || discounted >= rules.free_shipping_threshold {
        Decimal::ZERO
    } else {
        rules.shipping_flat_rate
    };
    let tax = round_money(discounted * rules.tax_rate_percent / Decimal::ONE_HUNDRED);

    Ok(OrderTotals {
        subtotal,
        discount,
        shipping_fee,
        tax,
        total: discounted + shipping_fee + tax,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use kirana_core::{CouponId, DiscountType};

    use super::*;

    fn product(id: i32, category: &str, price: Decimal, stock: i32) -> Product {
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
            images: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_lock_order_sorts_by_product_id() {
        let lines = vec![
            OrderLine {
                product: product(9, "dairy", Decimal::ONE, 5),
                quantity: 1,
            },
            OrderLine {
                product: product(2, "dairy", Decimal::ONE, 5),
                quantity: 3,
            },
            OrderLine {
                product: product(5, "dairy", Decimal::ONE, 5),
                quantity: 2,
            },
        ];

        let ids: Vec<i32> = lock_order(&lines)
            .iter()
            .map(|l| l.product.id.as_i32())
            .collect();
        assert_eq!(ids, vec![2, 5, 9]);
        // Request order is kept for the stored items.
        assert_eq!(lines[0].product.id, ProductId::new(9));
    }

    fn item(id: i32, quantity: i32) -> ItemRequest {
        ItemRequest {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    fn coupon(discount_type: DiscountType, value: Decimal) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: CouponId::new(1),
            code: "TEST".to_owned(),
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

    #[test]
    fn test_merge_items_combines_duplicates() {
        let merged = merge_items(&[item(1, 2), item(2, 1), item(1, 3)]).unwrap();
        assert_eq!(
            merged,
            vec![(ProductId::new(1), 5), (ProductId::new(2), 1)]
        );
    }

    #[test]
    fn test_merge_items_rejects_empty_and_bad_quantities() {
        assert!(matches!(merge_items(&[]), Err(CheckoutError::EmptyOrder)));
        assert!(matches!(
            merge_items(&[item(1, 0)]),
            Err(CheckoutError::InvalidQuantity { .. })
        ));
        assert!(matches!(
            merge_items(&[item(1, 6), item(1, 5)]),
            Err(CheckoutError::InvalidQuantity { quantity: 11, .. })
        ));
    }

    #[test]
    fn test_validate_lines_checks_stock() {
        let products = vec![product(1, "snacks", Decimal::from(10), 2)];
        let err = validate_lines(&[(ProductId::new(1), 3)], products).unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock { available: 2, .. }
        ));
    }

    #[test]
    fn test_validate_lines_rejects_missing_and_inactive() {
        let err = validate_lines(&[(ProductId::new(9), 1)], Vec::new()).unwrap_err();
        assert!(matches!(err, CheckoutError::ProductUnavailable(_)));

        let mut inactive = product(1, "snacks", Decimal::from(10), 5);
        inactive.is_active = false;
        let err = validate_lines(&[(ProductId::new(1), 1)], vec![inactive]).unwrap_err();
        assert!(matches!(err, CheckoutError::ProductUnavailable(_)));
    }

    #[test]
    fn test_price_order_charges_shipping_below_threshold() {
        let lines = validate_lines(
            &[(ProductId::new(1), 2)],
            vec![product(1, "snacks", Decimal::new(12_050, 2), 10)],
        )
        .unwrap();
        let totals = price_order(&lines, None, &PricingConfig::default()).unwrap();
        assert_eq!(totals.subtotal, Decimal::new(24_100, 2));
        assert_eq!(totals.shipping_fee, Decimal::from(49));
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::new(29_000, 2));
    }

    #[test]
    fn test_price_order_free_shipping_uses_discounted_subtotal() {
        let lines = validate_lines(
            &[(ProductId::new(1), 1)],
            vec![product(1, "snacks", Decimal::from(520), 10)],
        )
        .unwrap();
        let rules = PricingConfig::default();

        let no_coupon = price_order(&lines, None, &rules).unwrap();
        assert_eq!(no_coupon.shipping_fee, Decimal::ZERO);

        let c = coupon(DiscountType::Fixed, Decimal::from(50));
        let with_coupon = price_order(
            &lines,
            Some(CouponApplication {
                coupon: &c,
                user_usage_count: 0,
                now: Utc::now(),
            }),
            &rules,
        )
        .unwrap();
        assert_eq!(with_coupon.discount, Decimal::from(50));
        assert_eq!(with_coupon.shipping_fee, Decimal::from(49));
        assert_eq!(with_coupon.total, Decimal::from(519));
    }

    #[test]
    fn test_price_order_applies_tax_after_discount() {
        let lines = validate_lines(
            &[(ProductId::new(1), 1)],
            vec![product(1, "snacks", Decimal::from(1000), 10)],
        )
        .unwrap();
        let rules = PricingConfig {
            tax_rate_percent: Decimal::from(5),
            ..PricingConfig::default()
        };
        let c = coupon(DiscountType::Percentage, Decimal::from(10));
        let totals = price_order(
            &lines,
            Some(CouponApplication {
                coupon: &c,
                user_usage_count: 0,
                now: Utc::now(),
            }),
            &rules,
        )
        .unwrap();
        assert_eq!(totals.discount, Decimal::from(100));
        assert_eq!(totals.tax, Decimal::from(45));
        assert_eq!(totals.total, Decimal::from(945));
        assert_eq!(
            totals.total,
            totals.subtotal - totals.discount + totals.shipping_fee + totals.tax
        );
    }

    #[test]
    fn test_price_order_propagates_coupon_rejection() {
        let lines = validate_lines(
            &[(ProductId::new(1), 1)],
            vec![product(1, "snacks", Decimal::from(100), 10)],
        )
        .unwrap();
        let mut c = coupon(DiscountType::Fixed, Decimal::from(10));
        c.minimum_order_amount = Decimal::from(500);
        let result = price_order(
            &lines,
            Some(CouponApplication {
                coupon: &c,
                user_usage_count: 0,
                now: Utc::now(),
            }),
            &PricingConfig::default(),
        );
        assert!(matches!(result, Err(CheckoutError::Coupon(_))));
    }
}
