//! Razorpay payment gateway client.
//!
//! Creates gateway orders over the REST API and verifies the two kinds of
//! HMAC-SHA256 signatures Razorpay produces:
//!
//! - checkout callback: `hex(HMAC(key_secret, "{order_id}|{payment_id}"))`
//! - webhook: `hex(HMAC(webhook_secret, raw_body))` in `X-Razorpay-Signature`

use std::time::Duration;

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, error, instrument};

use kirana_core::{CURRENCY_CODE, MoneyError, to_minor_units};

use crate::config::RazorpayConfig;

type HmacSha256 = Hmac<Sha256>;

/// Timeout for gateway API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors talking to Razorpay.
#[derive(Debug, Error)]
pub enum RazorpayError {
    /// Network or transport failure.
    #[error("request failed: {0}")]
    Request(String),

    /// Razorpay returned an error response.
    #[error("gateway error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("invalid response: {0}")]
    Response(String),

    /// Amount cannot be expressed in paise.
    #[error("invalid amount: {0}")]
    Amount(#[from] MoneyError),

    /// Signature did not match.
    #[error("invalid signature")]
    InvalidSignature,

    /// Webhook received but no webhook secret is configured.
    #[error("webhook secret not configured")]
    WebhookNotConfigured,
}

/// A gateway order as returned by `POST /orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Amount in paise.
    pub amount: i64,
    pub currency: String,
    pub receipt: Option<String>,
    pub status: String,
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    description: Option<String>,
}

/// A webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

/// Entities carried by a webhook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<EntityWrapper<PaymentEntity>>,
    pub refund: Option<EntityWrapper<RefundEntity>>,
}

/// Razorpay wraps every entity in `{ "entity": ... }`.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

/// The payment part of a webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    pub order_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// The refund part of a webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct RefundEntity {
    pub id: String,
    pub payment_id: String,
}

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: SecretString,
    webhook_secret: Option<SecretString>,
    api_base: String,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a client from configuration.
    #[must_use]
    pub fn new(config: &RazorpayConfig) -> Self {
        Self {
            client: Client::new(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
            api_base: config.api_base.clone(),
        }
    }

    /// Public key id, safe to hand to the browser checkout.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create a gateway order for `amount` rupees.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::Amount` for negative amounts,
    /// `RazorpayError::Request` on transport failure and
    /// `RazorpayError::Api` when Razorpay rejects the order.
    #[instrument(skip(self, notes), fields(receipt = %receipt))]
    pub async fn create_order(
        &self,
        amount: Decimal,
        receipt: &str,
        notes: &[(&str, String)],
    ) -> Result<GatewayOrder, RazorpayError> {
        let body = CreateOrderRequest {
            amount: to_minor_units(amount)?,
            currency: CURRENCY_CODE,
            receipt,
            notes: notes
                .iter()
                .map(|(k, v)| ((*k).to_owned(), serde_json::Value::String(v.clone())))
                .collect(),
        };

        let response = self
            .client
            .post(format!("{}/orders", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| RazorpayError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|r| r.error.description)
                .unwrap_or_else(|| status.to_string());
            error!(status = status.as_u16(), %message, "Razorpay rejected order");
            return Err(RazorpayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| RazorpayError::Response(e.to_string()))?;

        debug!(gateway_order_id = %order.id, amount = order.amount, "Gateway order created");
        Ok(order)
    }

    /// Verify the signature returned by the checkout widget.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::InvalidSignature` on mismatch.
    pub fn verify_payment_signature(
        &self,
        razorpay_order_id: &str,
        razorpay_payment_id: &str,
        signature: &str,
    ) -> Result<(), RazorpayError> {
        let message = format!("{razorpay_order_id}|{razorpay_payment_id}");
        verify_hmac_hex(
            self.key_secret.expose_secret().as_bytes(),
            message.as_bytes(),
            signature,
        )
    }

    /// Verify a webhook body against its `X-Razorpay-Signature` header.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::WebhookNotConfigured` without a webhook
    /// secret and `RazorpayError::InvalidSignature` on mismatch.
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> Result<(), RazorpayError> {
        let secret = self
            .webhook_secret
            .as_ref()
            .ok_or(RazorpayError::WebhookNotConfigured)?;
        verify_hmac_hex(secret.expose_secret().as_bytes(), body, signature)
    }
}

/// Hex-encoded HMAC-SHA256 of `message` under `secret`.
///
/// # Errors
///
/// Returns `InvalidLength` if the key is rejected by the MAC.
pub fn sign_hex(secret: &[u8], message: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret)?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex signature in constant time.
///
/// # Errors
///
/// Returns `RazorpayError::InvalidSignature` if `signature` is not hex or
/// does not match.
pub fn verify_hmac_hex(secret: &[u8], message: &[u8], signature: &str) -> Result<(), RazorpayError> {
    let provided = hex::decode(signature.trim()).map_err(|_| RazorpayError::InvalidSignature)?;
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| RazorpayError::InvalidSignature)?;
    mac.update(message);
    mac.verify_slice(&provided)
        .map_err(|_| RazorpayError::InvalidSignature)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(webhook_secret: Option<&str>) -> RazorpayClient {
        RazorpayClient::new(&RazorpayConfig {
            key_id: "rzp_test_abc".to_owned(),
            key_secret: SecretString::from("test_key_secret"),
            webhook_secret: webhook_secret.map(SecretString::from),
            api_base: "https://api.razorpay.com/v1".to_owned(),
        })
    }

    #[test]
    fn test_payment_signature_roundtrip() {
        let signature = sign_hex(b"test_key_secret", b"order_123|pay_456").unwrap();
        let rzp = client(None);
        assert!(
            rzp.verify_payment_signature("order_123", "pay_456", &signature)
                .is_ok()
        );
    }

    #[test]
    fn test_payment_signature_rejects_swapped_ids() {
        let signature = sign_hex(b"test_key_secret", b"order_123|pay_456").unwrap();
        let rzp = client(None);
        assert!(matches!(
            rzp.verify_payment_signature("order_123", "pay_999", &signature),
            Err(RazorpayError::InvalidSignature)
        ));
    }

    #[test]
    fn test_payment_signature_rejects_non_hex() {
        let rzp = client(None);
        assert!(
            rzp.verify_payment_signature("order_123", "pay_456", "zz-not-hex")
                .is_err()
        );
    }

    #[test]
    fn test_known_hmac_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign_hex(b"Jefe", b"what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_webhook_signature() {
        let body = br#"{"event":"payment.captured"}"#;
        let signature = sign_hex(b"whsec_test", body).unwrap();
        let rzp = client(Some("whsec_test"));
        assert!(rzp.verify_webhook_signature(body, &signature).is_ok());
        assert!(
            rzp.verify_webhook_signature(b"{\"event\":\"tampered\"}", &signature)
                .is_err()
        );
    }

    #[test]
    fn test_webhook_requires_secret() {
        let rzp = client(None);
        assert!(matches!(
            rzp.verify_webhook_signature(b"{}", "00"),
            Err(RazorpayError::WebhookNotConfigured)
        ));
    }

    #[test]
    fn test_parse_payment_captured_event() {
        let json = r#"{
            "entity": "event",
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_29QQoUBi66xm2f",
                        "order_id": "order_9A33XWu170gUtm",
                        "status": "captured",
                        "amount": 50000
                    }
                }
            }
        }"#;
        let event: WebhookEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event, "payment.captured");
        let payment = event.payload.payment.unwrap().entity;
        assert_eq!(payment.order_id.as_deref(), Some("order_9A33XWu170gUtm"));
    }

    #[test]
    fn test_parse_refund_event() {
        let json = r#"{
            "event": "refund.processed",
            "payload": {
                "refund": { "entity": { "id": "rfnd_1", "payment_id": "pay_1" } },
                "payment": { "entity": { "id": "pay_1", "order_id": "order_1" } }
            }
        }"#;
        let event: WebhookEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.payload.refund.unwrap().entity.payment_id, "pay_1");
    }

    #[test]
    fn test_debug_redacts_secret() {
        assert!(!format!("{:?}", client(None)).contains("test_key_secret"));
    }
}
