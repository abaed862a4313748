//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                         - Liveness
//! GET    /health/ready                   - Readiness (database ping)
//!
//! # Auth (/api/auth, strict rate limit on the unauthenticated forms)
//! POST   /register  /login  /logout  /forgot-password  /reset-password
//! GET    /me
//! PUT    /password
//!
//! # Catalog
//! GET    /api/products                   - List with filters and pagination
//! GET    /api/products/categories        - Categories with counts
//! GET    /api/products/featured          - Featured products by category
//! GET    /api/products/{id}              - Product detail
//! GET    /api/banner                     - Active banners
//!
//! # Shopping (requires auth)
//! GET    /api/cart                       - Cart with line totals
//! POST   /api/cart                       - Add item
//! PUT    /api/cart/{product_id}          - Set quantity
//! DELETE /api/cart/{product_id}          - Remove item
//! DELETE /api/cart                       - Clear cart
//! GET    /api/wishlist                   - Wishlist
//! POST   /api/wishlist/{product_id}      - Add (idempotent)
//! DELETE /api/wishlist/{product_id}      - Remove
//! POST   /api/coupons/validate           - Preview a coupon on the cart
//! GET    /api/coupons/available          - Usable coupons
//!
//! # Orders and payment (requires auth)
//! POST   /api/orders                     - Place order
//! GET    /api/orders                     - My orders
//! GET    /api/orders/{id}                - My order with items
//! POST   /api/orders/{id}/cancel         - Cancel my order
//! GET    /api/payment/key                - Public gateway key
//! POST   /api/payment/create-order       - (Re)create gateway order
//! POST   /api/payment/verify             - Verify checkout signature
//! POST   /api/payment/webhook            - Gateway webhook (signature auth)
//! GET    /api/payment/methods            - Saved cards
//! POST   /api/payment/methods            - Save card
//! PUT    /api/payment/methods/{id}/default
//! DELETE /api/payment/methods/{id}
//!
//! # Profile (requires auth)
//! GET    /api/users/profile   PUT /api/users/profile
//! POST   /api/users/avatar               - Multipart avatar upload
//!
//! # Admin (requires admin)
//! POST   /api/uploads                    - Multipart image upload (Cloudinary)
//! /api/admin/...                         - see `admin`
//! ```

pub mod admin;
pub mod auth;
pub mod banners;
pub mod cart;
pub mod coupons;
pub mod orders;
pub mod payment;
pub mod products;
pub mod uploads;
pub mod users;
pub mod wishlist;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest, FromRequestParts, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use serde::Serialize;
use serde_json::json;

use crate::db::Pagination;
use crate::error::AppError;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::services::uploads::{MAX_AVATAR_BYTES, MAX_IMAGE_BYTES, MAX_IMAGES_PER_UPLOAD};
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file bytes.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// =============================================================================
// Response envelope and extractors
// =============================================================================

/// Success body: `{"success": true, "message"?: ..., "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

/// Wrap `data` in a success envelope.
pub const fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        message: None,
        data,
    })
}

/// Wrap `data` in a success envelope with a message.
pub const fn ok_with<T: Serialize>(message: &'static str, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        message: Some(message),
        data,
    })
}

/// Success envelope with only a message.
pub const fn done(message: &'static str) -> Json<ApiResponse<()>> {
    ok_with(message, ())
}

/// A page of results.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> From<(Vec<T>, Pagination)> for Page<T> {
    fn from((items, pagination): (Vec<T>, Pagination)) -> Self {
        Self { items, pagination }
    }
}

/// JSON body extractor whose rejections use the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections use the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path extractor whose rejections use the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

// =============================================================================
// Routers
// =============================================================================

/// Auth routes that accept credentials, behind the strict limiter.
fn credential_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .layer(auth_rate_limiter())
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/password", put(auth::change_password))
        .merge(credential_routes())
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/categories", get(products::categories))
        .route("/featured", get(products::featured))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add).delete(cart::clear))
        .route("/{product_id}", put(cart::update).delete(cart::remove))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::index))
        .route("/{product_id}", post(wishlist::add).delete(wishlist::remove))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/key", get(payment::key))
        .route("/create-order", post(payment::create_order))
        .route("/verify", post(payment::verify))
        .route("/webhook", post(payment::webhook))
        .route("/methods", get(payment::methods).post(payment::add_method))
        .route("/methods/{id}", delete(payment::delete_method))
        .route("/methods/{id}/default", put(payment::set_default_method))
}

/// Create the coupon routes router.
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/validate", post(coupons::validate))
        .route("/available", get(coupons::available))
}

/// Create the user profile routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(users::profile).put(users::update_profile))
        .route(
            "/avatar",
            post(users::upload_avatar)
                .layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES + MULTIPART_OVERHEAD)),
        )
}

/// Create all `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/wishlist", wishlist_routes())
        .nest("/orders", order_routes())
        .nest("/payment", payment_routes())
        .nest("/coupons", coupon_routes())
        .nest("/users", user_routes())
        .route("/banner", get(banners::index))
        .route(
            "/uploads",
            post(uploads::upload).layer(DefaultBodyLimit::max(
                MAX_IMAGE_BYTES * MAX_IMAGES_PER_UPLOAD + MULTIPART_OVERHEAD,
            )),
        )
        .nest("/admin", admin::routes())
        .layer(api_rate_limiter())
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .nest("/api", api_routes())
        .fallback(not_found)
}

/// Liveness probe.
async fn health() -> impl IntoResponse {
    Json(json!({ "success": true, "status": "ok" }))
}

/// Readiness probe: the database must answer.
async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(state.pool()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "success": true, "status": "ready" })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "success": false, "status": "database unavailable" })),
            )
        }
    }
}

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_shape() {
        let Json(body) = ok_with("Added", vec![1, 2]);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["message"], "Added");
        assert_eq!(value["data"], json!([1, 2]));
    }

    #[test]
    fn test_message_is_omitted_when_absent() {
        let Json(body) = ok("x");
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("message").is_none());
    }

    mod router {
        use std::path::PathBuf;

        use axum::body::{Body, to_bytes};
        use axum::http::Request;
        use base64::{Engine, engine::general_purpose::STANDARD};
        use secrecy::SecretString;
        use sqlx::postgres::PgPoolOptions;
        use tower::ServiceExt;

        use super::*;
        use crate::config::{PricingConfig, RazorpayConfig, StorefrontConfig};

        fn app() -> Router {
            let config = StorefrontConfig {
                database_url: SecretString::from("postgres://localhost/kirana_test"),
                host: "127.0.0.1".parse().unwrap(),
                port: 5000,
                base_url: "http://localhost:5173".to_owned(),
                log_json: false,
                razorpay: RazorpayConfig {
                    key_id: "rzp_test_key".to_owned(),
                    key_secret: SecretString::from("rzp_key_secret"),
                    webhook_secret: None,
                    api_base: "https://api.razorpay.com/v1".to_owned(),
                },
                email: None,
                cloudinary: None,
                upload_dir: PathBuf::from("uploads"),
                payment_method_key: SecretString::from(STANDARD.encode([3_u8; 32])),
                pricing: PricingConfig::default(),
                sentry_dsn: None,
                sentry_environment: None,
                sentry_sample_rate: 1.0,
                sentry_traces_sample_rate: 0.0,
            };
            // Never connects unless a handler touches the database.
            let pool = PgPoolOptions::new()
                .connect_lazy("postgres://localhost/kirana_test")
                .unwrap();
            routes().with_state(AppState::new(config, pool).unwrap())
        }

        async fn get(uri: &str) -> (StatusCode, serde_json::Value) {
            let response = app()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, serde_json::from_slice(&bytes).unwrap())
        }

        #[tokio::test]
        async fn test_health() {
            let (status, body) = get("/health").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "ok");
        }

        #[tokio::test]
        async fn test_unknown_route_uses_error_envelope() {
            let (status, body) = get("/definitely-not-here").await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["success"], false);
            assert_eq!(body["message"], "Route not found");
        }

        #[tokio::test]
        async fn test_payment_key_is_public() {
            let (status, body) = get("/api/payment/key").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert_eq!(body["data"]["key_id"], "rzp_test_key");
            assert_eq!(body["data"]["currency"], "INR");
        }
    }
}
