//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Registration, login, password changes and resets (argon2)
//! - `checkout` - Order pricing, placement, payment and lifecycle
//! - `razorpay` - Payment gateway client and signature checks
//! - `email` - Transactional email (SMTP via lettre, askama bodies)
//! - `vault` - AES-256-GCM sealing of saved card details
//! - `uploads` - Avatar storage on disk, catalog images on Cloudinary
//! - `cache` - moka cache for featured products and banners

pub mod auth;
pub mod cache;
pub mod checkout;
pub mod email;
pub mod razorpay;
pub mod uploads;
pub mod vault;
