//! Saved payment method repository.

use sqlx::PgPool;

use kirana_core::{PaymentMethodId, UserId};

use super::RepositoryError;
use crate::models::PaymentMethod;

/// Repository for saved cards.
pub struct PaymentMethodRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentMethodRepository<'a> {
    /// Create a new payment method repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's saved cards, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<PaymentMethod>, RepositoryError> {
        let methods = sqlx::query_as::<_, PaymentMethod>(
            r"
            SELECT id, user_id, card_network, last4, encrypted_details, is_default, created_at
            FROM payment_method
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(methods)
    }

    /// Save a card. The first card, or one flagged default, becomes default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        card_network: &str,
        last4: &str,
        encrypted_details: &str,
        make_default: bool,
    ) -> Result<PaymentMethod, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let has_default: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM payment_method WHERE user_id = $1 AND is_default)",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let is_default = make_default || !has_default;
        if is_default && has_default {
            sqlx::query("UPDATE payment_method SET is_default = FALSE WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let method = sqlx::query_as::<_, PaymentMethod>(
            r"
            INSERT INTO payment_method (user_id, card_network, last4, encrypted_details, is_default)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, card_network, last4, encrypted_details, is_default, created_at
            ",
        )
        .bind(user_id)
        .bind(card_network)
        .bind(last4)
        .bind(encrypted_details)
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(method)
    }

    /// Make one card the default, clearing the flag on the others.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the card is not the user's.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_default(
        &self,
        user_id: UserId,
        id: PaymentMethodId,
    ) -> Result<PaymentMethod, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE payment_method SET is_default = FALSE WHERE user_id = $1 AND id <> $2")
            .bind(user_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let method = sqlx::query_as::<_, PaymentMethod>(
            r"
            UPDATE payment_method
            SET is_default = TRUE
            WHERE user_id = $1 AND id = $2
            RETURNING id, user_id, card_network, last4, encrypted_details, is_default, created_at
            ",
        )
        .bind(user_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;
        Ok(method)
    }

    /// Delete a card. If it was the default, the newest remaining card
    /// takes over.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the card is not the user's.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, user_id: UserId, id: PaymentMethodId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default: bool = sqlx::query_scalar(
            "DELETE FROM payment_method WHERE user_id = $1 AND id = $2 RETURNING is_default",
        )
        .bind(user_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if was_default {
            sqlx::query(
                r"
                UPDATE payment_method SET is_default = TRUE
                WHERE id = (
                    SELECT id FROM payment_method WHERE user_id = $1
                    ORDER BY created_at DESC LIMIT 1
                )
                ",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
