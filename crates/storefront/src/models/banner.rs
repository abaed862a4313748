//! Home page banners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kirana_core::BannerId;

use super::{ValidationError, optional, required};

/// A promotional banner.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Banner {
    pub id: BannerId,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub position: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Admin create/update payload.
#[derive(Debug, Clone, Deserialize)]
pub struct BannerInput {
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl BannerInput {
    /// Trim text and require an absolute image URL.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank title or an image URL that does
    /// not parse.
    pub fn normalised(mut self) -> Result<Self, ValidationError> {
        self.title = required(&self.title, "title")?;
        self.subtitle = optional(self.subtitle.as_deref());
        self.link_url = optional(self.link_url.as_deref());

        let image_url = required(&self.image_url, "image url")?;
        url::Url::parse(&image_url)
            .map_err(|_| ValidationError::new("image url must be an absolute URL"))?;
        self.image_url = image_url;

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalised_requires_absolute_image_url() {
        let banner = BannerInput {
            title: "Festive sale".to_owned(),
            subtitle: None,
            image_url: "/img/sale.jpg".to_owned(),
            link_url: None,
            position: 0,
            is_active: true,
        };
        assert!(banner.normalised().is_err());
    }
}
