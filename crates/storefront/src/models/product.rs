//! Catalog product types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use kirana_core::{ProductId, round_money};

use super::{ValidationError, optional, required};

/// Most images a product may carry.
pub const MAX_IMAGES: usize = 10;

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub brand: Option<String>,
    pub price: Decimal,
    /// List price shown struck through next to `price`.
    pub mrp: Option<Decimal>,
    pub stock: i32,
    pub images: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// First image, used as the thumbnail on carts and orders.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Whether at least `quantity` units are available.
    #[must_use]
    pub fn has_stock_for(&self, quantity: i32) -> bool {
        self.stock >= quantity
    }
}

/// Admin create/update payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub brand: Option<String>,
    pub price: Decimal,
    pub mrp: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl ProductInput {
    /// Trim text fields, round prices and check ranges.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for blank names or categories, negative
    /// prices or stock, an MRP below the price, or too many images.
    pub fn normalised(mut self) -> Result<Self, ValidationError> {
        self.name = required(&self.name, "name")?;
        self.category = required(&self.category, "category")?.to_lowercase();
        self.description = self.description.trim().to_owned();
        self.brand = optional(self.brand.as_deref());

        if self.price.is_sign_negative() {
            return Err(ValidationError::new("price cannot be negative"));
        }
        self.price = round_money(self.price);

        if let Some(mrp) = self.mrp {
            if mrp < self.price {
                return Err(ValidationError::new("mrp cannot be below price"));
            }
            self.mrp = Some(round_money(mrp));
        }

        if self.stock < 0 {
            return Err(ValidationError::new("stock cannot be negative"));
        }

        self.images.retain(|url| !url.trim().is_empty());
        if self.images.len() > MAX_IMAGES {
            return Err(ValidationError::new(format!(
                "a product may have at most {MAX_IMAGES} images"
            )));
        }

        Ok(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        ProductInput {
            name: "  Basmati Rice 5kg ".to_owned(),
            description: String::new(),
            category: " Grains ".to_owned(),
            brand: Some(" ".to_owned()),
            price: Decimal::new(54_999, 2),
            mrp: Some(Decimal::new(62_000, 2)),
            stock: 20,
            images: vec!["https://img/1.jpg".to_owned(), " ".to_owned()],
            is_active: true,
        }
    }

    #[test]
    fn test_normalised_trims_and_lowercases() {
        let product = input().normalised().unwrap();
        assert_eq!(product.name, "Basmati Rice 5kg");
        assert_eq!(product.category, "grains");
        assert_eq!(product.brand, None);
        assert_eq!(product.images.len(), 1);
    }

    #[test]
    fn test_normalised_rejects_bad_prices() {
        let mut negative = input();
        negative.price = Decimal::new(-1, 0);
        assert!(negative.normalised().is_err());

        let mut low_mrp = input();
        low_mrp.mrp = Some(Decimal::ONE);
        assert!(low_mrp.normalised().is_err());
    }

    #[test]
    fn test_normalised_rejects_negative_stock() {
        let mut product = input();
        product.stock = -3;
        assert!(product.normalised().is_err());
    }
}
