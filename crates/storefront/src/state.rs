//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::auth::AuthService;
use crate::services::cache::CatalogCache;
use crate::services::checkout::OrderService;
use crate::services::email::EmailService;
use crate::services::razorpay::RazorpayClient;
use crate::services::uploads::{AvatarStore, CloudinaryClient};
use crate::services::vault::{CardVault, VaultError};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid payment method key: {0}")]
    Vault(#[from] VaultError),
    #[error("invalid SMTP configuration: {0}")]
    Email(#[from] lettre::transport::smtp::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    razorpay: RazorpayClient,
    email: Option<EmailService>,
    vault: CardVault,
    avatars: AvatarStore,
    cloudinary: Option<CloudinaryClient>,
    cache: CatalogCache,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if the payment method key or SMTP settings are
    /// invalid.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let razorpay = RazorpayClient::new(&config.razorpay);
        let email = config
            .email
            .as_ref()
            .map(|email| EmailService::new(email, &config.base_url))
            .transpose()?;
        let vault = CardVault::from_base64_key(&config.payment_method_key)?;
        let avatars = AvatarStore::new(&config.upload_dir);
        let cloudinary = config.cloudinary.clone().map(CloudinaryClient::new);

        if email.is_none() {
            tracing::warn!("SMTP not configured; transactional email disabled");
        }
        if cloudinary.is_none() {
            tracing::warn!("Cloudinary not configured; admin image uploads disabled");
        }

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                razorpay,
                email,
                vault,
                avatars,
                cloudinary,
                cache: CatalogCache::new(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Razorpay client.
    #[must_use]
    pub fn razorpay(&self) -> &RazorpayClient {
        &self.inner.razorpay
    }

    /// Email service, when SMTP is configured.
    #[must_use]
    pub fn email(&self) -> Option<&EmailService> {
        self.inner.email.as_ref()
    }

    /// Get a reference to the card vault.
    #[must_use]
    pub fn vault(&self) -> &CardVault {
        &self.inner.vault
    }

    /// Get a reference to local avatar storage.
    #[must_use]
    pub fn avatars(&self) -> &AvatarStore {
        &self.inner.avatars
    }

    /// Cloudinary client, when configured.
    #[must_use]
    pub fn cloudinary(&self) -> Option<&CloudinaryClient> {
        self.inner.cloudinary.as_ref()
    }

    /// Get a reference to the catalog cache.
    #[must_use]
    pub fn cache(&self) -> &CatalogCache {
        &self.inner.cache
    }

    /// Authentication service bound to this state's pool.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.pool())
    }

    /// Order service bound to this state's pool, gateway and mailer.
    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(
            self.pool(),
            self.razorpay(),
            self.email(),
            &self.inner.config.pricing,
        )
    }
}
