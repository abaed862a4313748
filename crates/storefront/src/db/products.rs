//! Product repository: catalog queries, admin CRUD, featured lists.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use kirana_core::ProductId;

use super::{PageRequest, Pagination, RepositoryError, like_pattern};
use crate::models::{Product, ProductInput};

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.category, p.brand, p.price, p.mrp, \
     p.stock, p.images, p.is_active, p.created_at, p.updated_at";

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id ASC",
            Self::PriceDesc => "p.price DESC, p.id DESC",
            Self::Name => "p.name ASC, p.id ASC",
        }
    }
}

/// Catalog filters from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    #[serde(default)]
    pub sort: ProductSort,
    /// Admin listings include deactivated products.
    #[serde(skip)]
    pub include_inactive: bool,
}

/// A category and how many active products it holds.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// What `delete` did with the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Row removed.
    Deleted,
    /// Referenced by orders, so only marked inactive.
    Deactivated,
}

#[derive(sqlx::FromRow)]
struct FeaturedRow {
    featured_category: String,
    #[sqlx(flatten)]
    product: Product,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`, one page at a time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: &PageRequest,
    ) -> Result<(Vec<Product>, Pagination), RepositoryError> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);
        let category = filter
            .category
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());
        let brand = filter
            .brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty());

        let where_clause = r"
            WHERE ($1 OR p.is_active)
              AND ($2::text IS NULL
                   OR p.name ILIKE $2 OR p.description ILIKE $2 OR p.brand ILIKE $2)
              AND ($3::text IS NULL OR p.category = $3)
              AND ($4::text IS NULL OR p.brand ILIKE $4)
              AND ($5::numeric IS NULL OR p.price >= $5)
              AND ($6::numeric IS NULL OR p.price <= $6)
              AND (NOT $7 OR p.stock > 0)
        ";

        let count_sql = format!("SELECT COUNT(*) FROM product p {where_clause}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.include_inactive)
            .bind(pattern.as_deref())
            .bind(category.as_deref())
            .bind(brand)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.in_stock.unwrap_or(false))
            .fetch_one(self.pool)
            .await?;

        let list_sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM product p {where_clause} ORDER BY {} LIMIT $8 OFFSET $9",
            filter.sort.order_by()
        );
        let products = sqlx::query_as::<_, Product>(&list_sql)
            .bind(filter.include_inactive)
            .bind(pattern.as_deref())
            .bind(category.as_deref())
            .bind(brand)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.in_stock.unwrap_or(false))
            .bind(i64::from(page.limit()))
            .bind(page.offset())
            .fetch_all(self.pool)
            .await?;

        Ok((products, page.meta(total)))
    }

    /// Get a product by ID, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.id = $1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// Get several products by ID. Missing IDs are simply absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.id = ANY($1)");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(ids)
            .fetch_all(self.pool)
            .await?;
        Ok(products)
    }

    /// Distinct categories of active products with counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<CategoryCount>, RepositoryError> {
        let categories = sqlx::query_as::<_, CategoryCount>(
            r"
            SELECT category, COUNT(*) AS count
            FROM product
            WHERE is_active
            GROUP BY category
            ORDER BY category
            ",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(categories)
    }

    /// Featured products per category, in their configured order.
    ///
    /// Inactive products are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn featured(&self) -> Result<BTreeMap<String, Vec<Product>>, RepositoryError> {
        let sql = format!(
            r"
            SELECT f.category AS featured_category, {PRODUCT_COLUMNS}
            FROM featured f
            CROSS JOIN LATERAL unnest(f.product_ids) WITH ORDINALITY AS u(product_id, ord)
            JOIN product p ON p.id = u.product_id
            WHERE p.is_active
            ORDER BY f.category, u.ord
            "
        );
        let rows = sqlx::query_as::<_, FeaturedRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        let mut featured: BTreeMap<String, Vec<Product>> = BTreeMap::new();
        for row in rows {
            featured
                .entry(row.featured_category)
                .or_default()
                .push(row.product);
        }
        Ok(featured)
    }

    /// Replace the featured list of a category. An empty list removes it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if any ID is not a product.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_featured(
        &self,
        category: &str,
        ids: &[ProductId],
    ) -> Result<(), RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();

        if ids.is_empty() {
            sqlx::query("DELETE FROM featured WHERE category = $1")
                .bind(category)
                .execute(self.pool)
                .await?;
            return Ok(());
        }

        let known: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_one(self.pool)
            .await?;
        let distinct = {
            let mut d = ids.clone();
            d.sort_unstable();
            d.dedup();
            d.len()
        };
        if usize::try_from(known).unwrap_or(0) != distinct {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            r"
            INSERT INTO featured (category, product_ids, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (category)
            DO UPDATE SET product_ids = EXCLUDED.product_ids, updated_at = NOW()
            ",
        )
        .bind(category)
        .bind(&ids)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            r"
            INSERT INTO product (name, description, category, brand, price, mrp, stock, images, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, name, description, category, brand, price, mrp,
                      stock, images, is_active, created_at, updated_at
            ",
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.category)
        .bind(input.brand.as_deref())
        .bind(input.price)
        .bind(input.mrp)
        .bind(input.stock)
        .bind(&input.images)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(product)
    }

    /// Replace every editable field of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(
            r"
            UPDATE product
            SET name = $2, description = $3, category = $4, brand = $5, price = $6,
                mrp = $7, stock = $8, images = $9, is_active = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, category, brand, price, mrp,
                      stock, images, is_active, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.category)
        .bind(input.brand.as_deref())
        .bind(input.price)
        .bind(input.mrp)
        .bind(input.stock)
        .bind(&input.images)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Add `delta` (possibly negative) to a product's stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if stock would drop below zero
    /// or past `i32::MAX`.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn adjust_stock(
        &self,
        id: ProductId,
        delta: i32,
    ) -> Result<Product, RepositoryError> {
        let updated = sqlx::query_as::<_, Product>(
            r"
            UPDATE product
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1 AND stock::BIGINT + $2 BETWEEN 0 AND 2147483647
            RETURNING id, name, description, category, brand, price, mrp,
                      stock, images, is_active, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(self.pool)
        .await?;

        match updated {
            Some(product) => Ok(product),
            None if self.get(id).await?.is_some() => Err(RepositoryError::Conflict(
                "stock cannot go below zero or past its maximum".to_owned(),
            )),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Delete a product, or deactivate it if orders reference it.
    ///
    /// The product is also dropped from every featured list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: ProductId) -> Result<DeleteOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE featured SET product_ids = array_remove(product_ids, $1)")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let referenced: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM order_item WHERE product_id = $1)")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        let (sql, outcome) = if referenced {
            (
                "UPDATE product SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
                DeleteOutcome::Deactivated,
            )
        } else {
            ("DELETE FROM product WHERE id = $1", DeleteOutcome::Deleted)
        };

        let result = sqlx::query(sql).bind(id).execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parses_snake_case() {
        let filter: ProductFilter = serde_json::from_str(r#"{"sort":"price_desc"}"#).unwrap();
        assert_eq!(filter.sort, ProductSort::PriceDesc);
        assert!(!filter.include_inactive);
    }

    #[test]
    fn test_sort_defaults_to_newest() {
        let filter: ProductFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(filter.sort, ProductSort::Newest);
        assert!(ProductSort::Newest.order_by().starts_with("p.created_at DESC"));
    }
}
