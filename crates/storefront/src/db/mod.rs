//! Database operations for the storefront `PostgreSQL`.
//!
//! # Tables
//!
//! - `app_user`, `user_password`, `password_reset_token` - accounts
//! - `product`, `featured` - catalog
//! - `cart_item`, `wishlist_item` - per-user shopping state
//! - `shop_order`, `order_item` - orders with embedded payment/delivery columns
//! - `coupon`, `coupon_usage` - discount codes and their usage history
//! - `payment_method` - saved cards (sealed details only)
//! - `banner` - home page banners
//! - `tower_sessions.session` - session storage (created by the CLI)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p kirana-cli -- migrate
//! ```

pub mod banners;
pub mod cart;
pub mod coupons;
pub mod dashboard;
pub mod orders;
pub mod payment_methods;
pub mod products;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use banners::BannerRepository;
pub use cart::CartRepository;
pub use coupons::CouponRepository;
pub use orders::OrderRepository;
pub use payment_methods::PaymentMethodRepository;
pub use products::ProductRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-violation into `Conflict`, everything else into `Database`.
    pub(crate) fn from_unique(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Page request parsed from `?page=&limit=` query parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size.
    pub limit: Option<u32>,
}

impl PageRequest {
    /// Default page size.
    pub const DEFAULT_LIMIT: u32 = 12;
    /// Largest page size a client may request.
    pub const MAX_LIMIT: u32 = 100;

    /// Normalised 1-based page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Normalised page size within `1..=MAX_LIMIT`.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    /// Row offset for `OFFSET`.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.limit())
    }

    /// Build pagination metadata for a total row count.
    #[must_use]
    pub fn meta(&self, total: i64) -> Pagination {
        let limit = i64::from(self.limit());
        let total = total.max(0);
        Pagination {
            page: self.page(),
            limit: self.limit(),
            total,
            pages: (total + limit - 1) / limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: Some(1),
            limit: Some(Self::DEFAULT_LIMIT),
        }
    }
}

/// Pagination metadata returned alongside list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub pages: i64,
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
#[must_use]
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults() {
        let page = PageRequest {
            page: None,
            limit: None,
        };
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), PageRequest::DEFAULT_LIMIT);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_page_request_clamps() {
        let page = PageRequest {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(page.page(), 1);
        assert_eq!(page.limit(), PageRequest::MAX_LIMIT);
    }

    #[test]
    fn test_page_request_offset() {
        let page = PageRequest {
            page: Some(3),
            limit: Some(20),
        };
        assert_eq!(page.offset(), 40);
    }

    #[test]
    fn test_pagination_meta_rounds_pages_up() {
        let page = PageRequest {
            page: Some(1),
            limit: Some(10),
        };
        assert_eq!(page.meta(21).pages, 3);
        assert_eq!(page.meta(20).pages, 2);
        assert_eq!(page.meta(0).pages, 0);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("tea"), "%tea%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
