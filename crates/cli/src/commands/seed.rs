//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Basmati Rice 1kg
//!     category: staples
//!     price: "129.00"
//!     stock: 40
//! coupons:
//!   - code: WELCOME50
//!     discount_type: fixed
//!     discount_value: "50"
//!     valid_from: 2026-01-01T00:00:00Z
//!     valid_until: 2026-12-31T23:59:59Z
//! banners:
//!   - title: Fresh every morning
//!     image_url: https://cdn.example.com/banner.jpg
//! featured:
//!   staples: [Basmati Rice 1kg]
//! ```
//!
//! Rows that already exist (same product name, coupon code or banner
//! title) are skipped, so the command can be re-run.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};

use kirana_core::ProductId;
use kirana_storefront::db::{BannerRepository, CouponRepository, ProductRepository};
use kirana_storefront::models::{BannerInput, CouponInput, ProductInput};

use super::connect;

/// Contents of a seed file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub products: Vec<ProductInput>,
    #[serde(default)]
    pub coupons: Vec<CouponInput>,
    #[serde(default)]
    pub banners: Vec<BannerInput>,
    /// Category to product names, in display order.
    #[serde(default)]
    pub featured: BTreeMap<String, Vec<String>>,
}

impl SeedFile {
    /// Parse a seed file.
    ///
    /// # Errors
    ///
    /// Returns the YAML error for malformed input.
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Check every entry before anything is written.
    ///
    /// Returns one message per invalid entry.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for p in &self.products {
            if let Err(e) = p.clone().normalised() {
                errors.push(format!("product {:?}: {e}", p.name));
            }
        }
        for c in &self.coupons {
            if let Err(e) = c.clone().normalised() {
                errors.push(format!("coupon {:?}: {e}", c.code));
            }
        }
        for b in &self.banners {
            if let Err(e) = b.clone().normalised() {
                errors.push(format!("banner {:?}: {e}", b.title));
            }
        }
        for (category, names) in &self.featured {
            for name in names {
                if !self.products.iter().any(|p| p.name.trim() == name.trim()) {
                    errors.push(format!(
                        "featured {category:?}: {name:?} is not a product in this file"
                    ));
                }
            }
        }

        errors
    }
}

/// Counts reported after seeding.
#[derive(Debug, Default)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Seed the database from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, any entry is
/// invalid, or a database operation fails.
pub async fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!(path = %path.display(), "Loading seed file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed = SeedFile::parse(&content)?;

    let errors = seed.validate();
    if !errors.is_empty() {
        for err in &errors {
            warn!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = connect().await?;

    let mut summary = SeedSummary::default();
    let product_ids = seed_products(&pool, &seed.products, &mut summary).await?;
    seed_coupons(&pool, &seed.coupons, &mut summary).await?;
    seed_banners(&pool, &seed.banners, &mut summary).await?;

    let products = ProductRepository::new(&pool);
    for (category, names) in &seed.featured {
        let ids: Vec<ProductId> = names
            .iter()
            .filter_map(|n| product_ids.get(n.trim()).copied())
            .collect();
        products
            .set_featured(&category.trim().to_lowercase(), &ids)
            .await?;
        info!(category = %category, count = ids.len(), "Featured list set");
    }

    info!("Seeding complete!");
    info!("  Rows inserted: {}", summary.inserted);
    info!("  Rows skipped (already exist): {}", summary.skipped);
    Ok(())
}

async fn seed_products(
    pool: &PgPool,
    inputs: &[ProductInput],
    summary: &mut SeedSummary,
) -> Result<BTreeMap<String, ProductId>, Box<dyn std::error::Error>> {
    let repo = ProductRepository::new(pool);
    let mut ids = BTreeMap::new();

    for input in inputs {
        let input = input.clone().normalised()?;
        let existing: Option<i32> =
            sqlx::query_scalar("SELECT id FROM product WHERE name = $1 ORDER BY id LIMIT 1")
                .bind(&input.name)
                .fetch_optional(pool)
                .await?;

        let id = if let Some(id) = existing {
            summary.skipped += 1;
            ProductId::new(id)
        } else {
            summary.inserted += 1;
            repo.create(&input).await?.id
        };
        ids.insert(input.name, id);
    }

    Ok(ids)
}

async fn seed_coupons(
    pool: &PgPool,
    inputs: &[CouponInput],
    summary: &mut SeedSummary,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo = CouponRepository::new(pool);

    for input in inputs {
        let input = input.clone().normalised()?;
        if repo.get_by_code(&input.code).await?.is_some() {
            summary.skipped += 1;
            continue;
        }
        repo.create(&input).await?;
        summary.inserted += 1;
    }

    Ok(())
}

async fn seed_banners(
    pool: &PgPool,
    inputs: &[BannerInput],
    summary: &mut SeedSummary,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo = BannerRepository::new(pool);

    for input in inputs {
        let input = input.clone().normalised()?;
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM banner WHERE title = $1)")
            .bind(&input.title)
            .fetch_one(pool)
            .await?;
        if exists {
            summary.skipped += 1;
            continue;
        }
        repo.create(&input).await?;
        summary.inserted += 1;
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
products:
  - name: Basmati Rice 1kg
    category: Staples
    price: "129.00"
    stock: 40
  - name: Toor Dal 500g
    category: staples
    price: "89.50"
coupons:
  - code: welcome50
    discount_type: fixed
    discount_value: "50"
    valid_from: 2026-01-01T00:00:00Z
    valid_until: 2026-12-31T23:59:59Z
banners:
  - title: Fresh every morning
    image_url: https://cdn.example.com/banner.jpg
featured:
  staples: [Basmati Rice 1kg, Toor Dal 500g]
"#;

    #[test]
    fn test_parse_sample() {
        let seed = SeedFile::parse(SAMPLE).unwrap();
        assert_eq!(seed.products.len(), 2);
        assert_eq!(seed.coupons.len(), 1);
        assert_eq!(seed.banners.len(), 1);
        assert_eq!(seed.featured["staples"].len(), 2);
        assert!(seed.validate().is_empty());
    }

    #[test]
    fn test_empty_file_is_valid() {
        let seed = SeedFile::parse("{}").unwrap();
        assert!(seed.products.is_empty());
        assert!(seed.validate().is_empty());
    }

    #[test]
    fn test_featured_must_reference_products() {
        let seed = SeedFile::parse(
            r#"
products:
  - name: Ghee
    category: dairy
    price: "550"
featured:
  dairy: [Paneer]
"#,
        )
        .unwrap();
        let errors = seed.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Paneer"));
    }

    #[test]
    fn test_invalid_coupon_reported() {
        let seed = SeedFile::parse(
            r#"
coupons:
  - code: BAD
    discount_type: percentage
    discount_value: "150"
    valid_from: 2026-01-01T00:00:00Z
    valid_until: 2026-12-31T23:59:59Z
"#,
        )
        .unwrap();
        assert_eq!(seed.validate().len(), 1);
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(SeedFile::parse("customers: []").is_err());
    }
}
