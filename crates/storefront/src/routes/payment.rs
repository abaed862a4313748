//! Payment route handlers: gateway checkout, webhook and saved cards.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use kirana_core::{CURRENCY_CODE, OrderId, PaymentMethodId};

use super::{ApiJson, ApiPath, done, ok, ok_with};
use crate::db::PaymentMethodRepository;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{NewPaymentMethod, PaymentMethod};
use crate::services::razorpay::{RazorpayError, WebhookEvent};
use crate::state::AppState;

/// Header carrying the webhook signature.
const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Public checkout configuration.
#[derive(Debug, Serialize)]
pub struct KeyResponse {
    pub key_id: String,
    pub currency: &'static str,
}

/// A saved card with its non-secret sealed fields opened.
#[derive(Debug, Serialize)]
pub struct SavedCard {
    #[serde(flatten)]
    pub method: PaymentMethod,
    pub expiry_month: Option<u8>,
    pub expiry_year: Option<u16>,
    pub holder_name: Option<String>,
}

/// Create-order body.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: OrderId,
}

/// Checkout callback forwarded by the client.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: OrderId,
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// The public Razorpay key id.
///
/// GET /api/payment/key
pub async fn key(State(state): State<AppState>) -> impl IntoResponse {
    ok(KeyResponse {
        key_id: state.razorpay().key_id().to_owned(),
        currency: CURRENCY_CODE,
    })
}

/// Create (or reuse) the gateway order for an unpaid order.
///
/// POST /api/payment/create-order
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn create_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CreatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let intent = state
        .orders()
        .create_payment(user.id, body.order_id)
        .await?;
    Ok(ok(intent))
}

/// Verify the checkout signature and mark the order paid.
///
/// POST /api/payment/verify
#[instrument(
    skip(state, user, body),
    fields(user_id = %user.id, order_id = %body.order_id)
)]
pub async fn verify(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let order = state
        .orders()
        .verify_payment(
            user.id,
            body.order_id,
            &body.razorpay_order_id,
            &body.razorpay_payment_id,
            &body.razorpay_signature,
        )
        .await?;
    Ok(ok_with("Payment verified", order))
}

/// Razorpay webhook.
///
/// POST /api/payment/webhook
///
/// Authenticated by the HMAC of the raw body; unknown events get a 200 so
/// Razorpay does not retry them.
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing webhook signature".to_owned()))?;

    if let Err(e) = state.razorpay().verify_webhook_signature(&body, signature) {
        if matches!(e, RazorpayError::InvalidSignature) {
            warn!("Webhook signature rejected");
        }
        return Err(e.into());
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {e}")))?;
    let outcome = state.orders().handle_webhook(event).await?;

    info!(?outcome, "Webhook handled");
    Ok((StatusCode::OK, done("Webhook processed")))
}

/// Saved cards, default first.
///
/// GET /api/payment/methods
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn methods(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let methods = PaymentMethodRepository::new(state.pool())
        .list(user.id)
        .await?;

    let cards: Vec<SavedCard> = methods
        .into_iter()
        .map(|method| match state.vault().open(&method.encrypted_details) {
            Ok(details) => SavedCard {
                expiry_month: Some(details.expiry_month),
                expiry_year: Some(details.expiry_year),
                holder_name: Some(details.holder_name),
                method,
            },
            Err(e) => {
                warn!(payment_method_id = %method.id, error = %e, "Saved card could not be opened");
                SavedCard {
                    method,
                    expiry_month: None,
                    expiry_year: None,
                    holder_name: None,
                }
            }
        })
        .collect();
    Ok(ok(cards))
}

/// Save a tokenised card.
///
/// POST /api/payment/methods
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn add_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<NewPaymentMethod>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let (year, month) = u16::try_from(now.year())
        .ok()
        .zip(u8::try_from(now.month()).ok())
        .ok_or_else(|| AppError::Internal("clock out of range".to_owned()))?;
    let method = body.normalised(year, month)?;

    let sealed = state.vault().seal(&method.details)?;
    let saved = PaymentMethodRepository::new(state.pool())
        .create(
            user.id,
            &method.card_network,
            &method.last4,
            &sealed,
            method.is_default,
        )
        .await?;

    info!(payment_method_id = %saved.id, network = %saved.card_network, "Card saved");
    Ok((StatusCode::CREATED, ok_with("Card saved", saved)))
}

/// Make a saved card the default.
///
/// PUT /api/payment/methods/{id}/default
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn set_default_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<PaymentMethodId>,
) -> Result<impl IntoResponse, AppError> {
    let method = PaymentMethodRepository::new(state.pool())
        .set_default(user.id, id)
        .await?;
    Ok(ok_with("Default card updated", method))
}

/// Delete a saved card.
///
/// DELETE /api/payment/methods/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_method(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<PaymentMethodId>,
) -> Result<impl IntoResponse, AppError> {
    PaymentMethodRepository::new(state.pool())
        .delete(user.id, id)
        .await?;
    Ok(done("Card removed"))
}
