//! Banner repository.

use sqlx::PgPool;

use kirana_core::BannerId;

use super::RepositoryError;
use crate::models::{Banner, BannerInput};

/// Repository for home page banners.
pub struct BannerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BannerRepository<'a> {
    /// Create a new banner repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Banners ordered by position; inactive ones only when asked for.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Banner>, RepositoryError> {
        let banners = sqlx::query_as::<_, Banner>(
            r"
            SELECT id, title, subtitle, image_url, link_url, position, is_active, created_at
            FROM banner
            WHERE $1 OR is_active
            ORDER BY position, id
            ",
        )
        .bind(include_inactive)
        .fetch_all(self.pool)
        .await?;
        Ok(banners)
    }

    /// Create a banner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, input: &BannerInput) -> Result<Banner, RepositoryError> {
        let banner = sqlx::query_as::<_, Banner>(
            r"
            INSERT INTO banner (title, subtitle, image_url, link_url, position, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, title, subtitle, image_url, link_url, position, is_active, created_at
            ",
        )
        .bind(&input.title)
        .bind(input.subtitle.as_deref())
        .bind(&input.image_url)
        .bind(input.link_url.as_deref())
        .bind(input.position)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(banner)
    }

    /// Replace a banner's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the banner does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update(&self, id: BannerId, input: &BannerInput) -> Result<Banner, RepositoryError> {
        sqlx::query_as::<_, Banner>(
            r"
            UPDATE banner
            SET title = $2, subtitle = $3, image_url = $4, link_url = $5,
                position = $6, is_active = $7
            WHERE id = $1
            RETURNING id, title, subtitle, image_url, link_url, position, is_active, created_at
            ",
        )
        .bind(id)
        .bind(&input.title)
        .bind(input.subtitle.as_deref())
        .bind(&input.image_url)
        .bind(input.link_url.as_deref())
        .bind(input.position)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a banner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the banner does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: BannerId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM banner WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
