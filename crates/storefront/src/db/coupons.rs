//! Coupon repository, including usage history.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use kirana_core::{CouponId, OrderId, UserId};

use super::RepositoryError;
use crate::models::{Coupon, CouponInput, CouponRejection};

const COUPON_COLUMNS: &str = "id, code, description, discount_type, discount_value, \
     minimum_order_amount, maximum_discount_amount, valid_from, valid_until, usage_limit, \
     usage_limit_per_user, used_count, applicable_categories, is_active, created_at, updated_at";

/// Repository for coupon database operations.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a coupon by its (already upper-cased) code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupon WHERE code = $1");
        let coupon = sqlx::query_as::<_, Coupon>(&sql)
            .bind(code)
            .fetch_optional(self.pool)
            .await?;
        Ok(coupon)
    }

    /// How many times a user has redeemed a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn user_usage_count(
        &self,
        coupon_id: CouponId,
        user_id: UserId,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM coupon_usage WHERE coupon_id = $1 AND user_id = $2",
        )
        .bind(coupon_id)
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Coupons a shopper can use right now, soonest expiry first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn available(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {COUPON_COLUMNS}
            FROM coupon
            WHERE is_active
              AND NOW() BETWEEN valid_from AND valid_until
              AND (usage_limit IS NULL OR used_count < usage_limit)
            ORDER BY valid_until, id
            "
        );
        let coupons = sqlx::query_as::<_, Coupon>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(coupons)
    }

    /// Every coupon, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupon ORDER BY created_at DESC, id DESC");
        let coupons = sqlx::query_as::<_, Coupon>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(coupons)
    }

    /// Create a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, input: &CouponInput) -> Result<Coupon, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO coupon (
                code, description, discount_type, discount_value, minimum_order_amount,
                maximum_discount_amount, valid_from, valid_until, usage_limit,
                usage_limit_per_user, applicable_categories, is_active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {COUPON_COLUMNS}
            "
        );
        sqlx::query_as::<_, Coupon>(&sql)
            .bind(&input.code)
            .bind(input.description.as_deref())
            .bind(input.discount_type)
            .bind(input.discount_value)
            .bind(input.minimum_order_amount)
            .bind(input.maximum_discount_amount)
            .bind(input.valid_from)
            .bind(input.valid_until)
            .bind(input.usage_limit)
            .bind(input.usage_limit_per_user)
            .bind(&input.applicable_categories)
            .bind(input.is_active)
            .fetch_one(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "coupon code"))
    }

    /// Replace every editable field of a coupon. `used_count` is kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    /// Returns `RepositoryError::Conflict` if the new code is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn update(
        &self,
        id: CouponId,
        input: &CouponInput,
    ) -> Result<Coupon, RepositoryError> {
        let sql = format!(
            r"
            UPDATE coupon
            SET code = $2, description = $3, discount_type = $4, discount_value = $5,
                minimum_order_amount = $6, maximum_discount_amount = $7, valid_from = $8,
                valid_until = $9, usage_limit = $10, usage_limit_per_user = $11,
                applicable_categories = $12, is_active = $13, updated_at = NOW()
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "
        );
        sqlx::query_as::<_, Coupon>(&sql)
            .bind(id)
            .bind(&input.code)
            .bind(input.description.as_deref())
            .bind(input.discount_type)
            .bind(input.discount_value)
            .bind(input.minimum_order_amount)
            .bind(input.maximum_discount_amount)
            .bind(input.valid_from)
            .bind(input.valid_until)
            .bind(input.usage_limit)
            .bind(input.usage_limit_per_user)
            .bind(&input.applicable_categories)
            .bind(input.is_active)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| RepositoryError::from_unique(e, "coupon code"))?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a coupon. Orders keep their copy of the code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM coupon WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Count one redemption against the coupon's limits and log it.
    ///
    /// The guarded update locks the coupon row until the transaction ends,
    /// so the per-user count read after it sees every committed redemption.
    /// On a rejection the caller must roll back; the `used_count` bump is
    /// not undone here.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn redeem_tx(
        conn: &mut PgConnection,
        coupon_id: CouponId,
        user_id: UserId,
        order_id: OrderId,
        discount: Decimal,
    ) -> Result<Result<(), CouponRejection>, RepositoryError> {
        let per_user_limit: Option<Option<i32>> = sqlx::query_scalar(
            r"
            UPDATE coupon
            SET used_count = used_count + 1, updated_at = NOW()
            WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)
            RETURNING usage_limit_per_user
            ",
        )
        .bind(coupon_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(per_user_limit) = per_user_limit else {
            return Ok(Err(CouponRejection::Exhausted));
        };

        if let Some(limit) = per_user_limit {
            let used: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM coupon_usage WHERE coupon_id = $1 AND user_id = $2",
            )
            .bind(coupon_id)
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await?;
            if used >= i64::from(limit) {
                return Ok(Err(CouponRejection::UserLimitReached));
            }
        }

        sqlx::query(
            r"
            INSERT INTO coupon_usage (coupon_id, user_id, order_id, discount_amount)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(coupon_id)
        .bind(user_id)
        .bind(order_id)
        .bind(discount)
        .execute(conn)
        .await?;

        Ok(Ok(()))
    }
}
