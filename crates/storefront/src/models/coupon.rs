//! Discount coupons and their evaluation rules.
//!
//! [`Coupon::evaluate`] is pure: the caller loads the coupon and the user's
//! prior usage count, then asks whether the coupon applies to a set of
//! priced lines and how much it takes off.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kirana_core::{CouponId, DiscountType, round_money};

use super::{ValidationError, optional};

/// A discount code.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub minimum_order_amount: Decimal,
    pub maximum_discount_amount: Option<Decimal>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub usage_limit: Option<i32>,
    pub usage_limit_per_user: Option<i32>,
    pub used_count: i32,
    /// Lower-case category names; empty means every category.
    pub applicable_categories: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One priced line as seen by coupon evaluation.
#[derive(Debug, Clone, Copy)]
pub struct CouponLine<'a> {
    pub category: &'a str,
    pub amount: Decimal,
}

/// Everything outside the coupon that decides whether it applies.
#[derive(Debug, Clone, Copy)]
pub struct CouponContext<'a> {
    pub now: DateTime<Utc>,
    pub lines: &'a [CouponLine<'a>],
    /// How many times this user has already redeemed the coupon.
    pub user_usage_count: i64,
}

impl CouponContext<'_> {
    fn subtotal(&self) -> Decimal {
        self.lines.iter().map(|l| l.amount).sum()
    }
}

/// Why a coupon cannot be applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CouponRejection {
    #[error("coupon not found")]
    NotFound,
    #[error("this coupon is no longer active")]
    Inactive,
    #[error("this coupon is not valid yet")]
    NotYetValid,
    #[error("this coupon has expired")]
    Expired,
    #[error("this coupon has reached its usage limit")]
    Exhausted,
    #[error("you have already used this coupon the maximum number of times")]
    UserLimitReached,
    #[error("this coupon does not apply to any item in your cart")]
    NotApplicable,
    #[error("minimum order amount of ₹{minimum} not met")]
    MinimumNotMet { minimum: Decimal },
}

impl Coupon {
    /// Whether the coupon is active, in its date window and not used up.
    #[must_use]
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && now >= self.valid_from
            && now <= self.valid_until
            && !self.is_exhausted()
    }

    fn is_exhausted(&self) -> bool {
        self.usage_limit.is_some_and(|limit| self.used_count >= limit)
    }

    fn applies_to(&self, category: &str) -> bool {
        self.applicable_categories.is_empty()
            || self
                .applicable_categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(category))
    }

    /// Sum of the lines this coupon applies to.
    #[must_use]
    pub fn eligible_amount(&self, lines: &[CouponLine<'_>]) -> Decimal {
        lines
            .iter()
            .filter(|l| self.applies_to(l.category))
            .map(|l| l.amount)
            .sum()
    }

    /// Check the coupon against an order and compute its discount.
    ///
    /// Checks run in order: active, date window, global usage, per-user
    /// usage, eligible items, minimum order amount.
    ///
    /// # Errors
    ///
    /// Returns the first `CouponRejection` that applies.
    pub fn evaluate(&self, ctx: &CouponContext<'_>) -> Result<Decimal, CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }
        if ctx.now < self.valid_from {
            return Err(CouponRejection::NotYetValid);
        }
        if ctx.now > self.valid_until {
            return Err(CouponRejection::Expired);
        }
        if self.is_exhausted() {
            return Err(CouponRejection::Exhausted);
        }
        if self
            .usage_limit_per_user
            .is_some_and(|limit| ctx.user_usage_count >= i64::from(limit))
        {
            return Err(CouponRejection::UserLimitReached);
        }

        let eligible = self.eligible_amount(ctx.lines);
        if eligible <= Decimal::ZERO {
            return Err(CouponRejection::NotApplicable);
        }

        let subtotal = ctx.subtotal();
        if subtotal < self.minimum_order_amount {
            return Err(CouponRejection::MinimumNotMet {
                minimum: self.minimum_order_amount,
            });
        }

        Ok(self.discount_for(eligible, subtotal))
    }

    fn discount_for(&self, eligible: Decimal, subtotal: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountType::Percentage => {
                let pct = eligible * self.discount_value / Decimal::ONE_HUNDRED;
                self.maximum_discount_amount
                    .map_or(pct, |cap| pct.min(cap))
            }
            DiscountType::Fixed => self.discount_value.min(eligible),
        };
        round_money(raw.min(subtotal).max(Decimal::ZERO))
    }
}

/// Admin create/update payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponInput {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub minimum_order_amount: Decimal,
    pub maximum_discount_amount: Option<Decimal>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub usage_limit: Option<i32>,
    pub usage_limit_per_user: Option<i32>,
    #[serde(default)]
    pub applicable_categories: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

/// Normalise a coupon code for storage and lookup.
#[must_use]
pub fn normalise_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl CouponInput {
    /// Upper-case the code, lower-case categories and check ranges.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for malformed codes, non-positive values,
    /// percentages above 100, inverted date windows or non-positive limits.
    pub fn normalised(mut self) -> Result<Self, ValidationError> {
        self.code = normalise_code(&self.code);
        if !(3..=32).contains(&self.code.len())
            || !self
                .code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::new(
                "code must be 3-32 letters, digits, dashes or underscores",
            ));
        }

        self.description = optional(self.description.as_deref());

        if self.discount_value <= Decimal::ZERO {
            return Err(ValidationError::new("discount value must be positive"));
        }
        if self.discount_type == DiscountType::Percentage
            && self.discount_value > Decimal::ONE_HUNDRED
        {
            return Err(ValidationError::new("percentage discount cannot exceed 100"));
        }
        if self.minimum_order_amount.is_sign_negative() {
            return Err(ValidationError::new("minimum order amount cannot be negative"));
        }
        if self
            .maximum_discount_amount
            .is_some_and(|cap| cap <= Decimal::ZERO)
        {
            return Err(ValidationError::new("maximum discount must be positive"));
        }
        if self.valid_until <= self.valid_from {
            return Err(ValidationError::new("valid_until must be after valid_from"));
        }
        if self.usage_limit.is_some_and(|n| n <= 0)
            || self.usage_limit_per_user.is_some_and(|n| n <= 0)
        {
            return Err(ValidationError::new("usage limits must be positive"));
        }

        self.discount_value = round_money(self.discount_value);
        self.applicable_categories = self
            .applicable_categories
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        Ok(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn coupon(discount_type: DiscountType, value: i64) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: CouponId::new(1),
            code: "SAVE".to_owned(),
            description: None,
            discount_type,
            discount_value: Decimal::from(value),
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

    fn ctx<'a>(lines: &'a [CouponLine<'a>]) -> CouponContext<'a> {
        CouponContext {
            now: Utc::now(),
            lines,
            user_usage_count: 0,
        }
    }

    fn line(category: &str, amount: i64) -> CouponLine<'_> {
        CouponLine {
            category,
            amount: Decimal::from(amount),
        }
    }

    #[test]
    fn test_percentage_discount() {
        let lines = [line("snacks", 400), line("dairy", 100)];
        let c = coupon(DiscountType::Percentage, 10);
        assert_eq!(c.evaluate(&ctx(&lines)).unwrap(), Decimal::from(50));
    }

    #[test]
    fn test_percentage_discount_capped() {
        let lines = [line("snacks", 1000)];
        let mut c = coupon(DiscountType::Percentage, 20);
        c.maximum_discount_amount = Some(Decimal::from(150));
        assert_eq!(c.evaluate(&ctx(&lines)).unwrap(), Decimal::from(150));
    }

    #[test]
    fn test_percentage_rounds_to_paise() {
        let lines = [CouponLine {
            category: "snacks",
            amount: Decimal::new(33_333, 2),
        }];
        let c = coupon(DiscountType::Percentage, 15);
        // 333.33 * 0.15 = 49.9995
        assert_eq!(c.evaluate(&ctx(&lines)).unwrap(), Decimal::new(5000, 2));
    }

    #[test]
    fn test_fixed_discount_capped_by_order() {
        let lines = [line("snacks", 80)];
        let c = coupon(DiscountType::Fixed, 100);
        assert_eq!(c.evaluate(&ctx(&lines)).unwrap(), Decimal::from(80));
    }

    #[test]
    fn test_category_restriction() {
        let lines = [line("snacks", 300), line("dairy", 200)];
        let mut c = coupon(DiscountType::Percentage, 10);
        c.applicable_categories = vec!["dairy".to_owned()];
        assert_eq!(c.evaluate(&ctx(&lines)).unwrap(), Decimal::from(20));

        c.applicable_categories = vec!["beverages".to_owned()];
        assert_eq!(
            c.evaluate(&ctx(&lines)),
            Err(CouponRejection::NotApplicable)
        );
    }

    #[test]
    fn test_minimum_order_amount() {
        let lines = [line("snacks", 199)];
        let mut c = coupon(DiscountType::Fixed, 50);
        c.minimum_order_amount = Decimal::from(200);
        assert_eq!(
            c.evaluate(&ctx(&lines)),
            Err(CouponRejection::MinimumNotMet {
                minimum: Decimal::from(200)
            })
        );
    }

    #[test]
    fn test_date_window() {
        let lines = [line("snacks", 100)];
        let mut c = coupon(DiscountType::Fixed, 10);
        c.valid_from = Utc::now() + Duration::hours(1);
        assert_eq!(c.evaluate(&ctx(&lines)), Err(CouponRejection::NotYetValid));

        let mut c = coupon(DiscountType::Fixed, 10);
        c.valid_until = Utc::now() - Duration::hours(1);
        assert_eq!(c.evaluate(&ctx(&lines)), Err(CouponRejection::Expired));
    }

    #[test]
    fn test_usage_limits_checked_before_amounts() {
        let lines = [line("snacks", 10)];
        let mut c = coupon(DiscountType::Fixed, 10);
        c.minimum_order_amount = Decimal::from(500);
        c.usage_limit = Some(5);
        c.used_count = 5;
        assert_eq!(c.evaluate(&ctx(&lines)), Err(CouponRejection::Exhausted));

        let mut c = coupon(DiscountType::Fixed, 10);
        c.usage_limit_per_user = Some(1);
        let context = CouponContext {
            user_usage_count: 1,
            ..ctx(&lines)
        };
        assert_eq!(
            c.evaluate(&context),
            Err(CouponRejection::UserLimitReached)
        );
    }

    #[test]
    fn test_inactive_checked_first() {
        let lines = [line("snacks", 100)];
        let mut c = coupon(DiscountType::Fixed, 10);
        c.is_active = false;
        c.valid_until = Utc::now() - Duration::hours(1);
        assert_eq!(c.evaluate(&ctx(&lines)), Err(CouponRejection::Inactive));
        assert!(!c.is_available(Utc::now()));
    }

    #[test]
    fn test_input_normalised() {
        let now = Utc::now();
        let input = CouponInput {
            code: " diwali-25 ".to_owned(),
            description: Some(String::new()),
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::from(25),
            minimum_order_amount: Decimal::ZERO,
            maximum_discount_amount: None,
            valid_from: now,
            valid_until: now + Duration::days(7),
            usage_limit: Some(100),
            usage_limit_per_user: Some(1),
            applicable_categories: vec![" Snacks ".to_owned(), String::new()],
            is_active: true,
        }
        .normalised()
        .unwrap();
        assert_eq!(input.code, "DIWALI-25");
        assert_eq!(input.description, None);
        assert_eq!(input.applicable_categories, vec!["snacks".to_owned()]);
    }

    #[test]
    fn test_input_rejects_percentage_over_100() {
        let now = Utc::now();
        let input = CouponInput {
            code: "BIG".to_owned(),
            description: None,
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::from(150),
            minimum_order_amount: Decimal::ZERO,
            maximum_discount_amount: None,
            valid_from: now,
            valid_until: now + Duration::days(1),
            usage_limit: None,
            usage_limit_per_user: None,
            applicable_categories: Vec::new(),
            is_active: true,
        };
        assert!(input.normalised().is_err());
    }
}
