//! Payment confirmation: checkout widget signatures, webhook deliveries and
//! the saved-card vault.

#![allow(clippy::unwrap_used)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::SecretString;

use kirana_storefront::config::RazorpayConfig;
use kirana_storefront::models::CardDetails;
use kirana_storefront::services::razorpay::{RazorpayClient, RazorpayError, WebhookEvent, sign_hex};
use kirana_storefront::services::vault::{CardVault, VaultError};

const KEY_SECRET: &str = "rzp_secret_for_tests";
const WEBHOOK_SECRET: &str = "whsec_for_tests";

fn client() -> RazorpayClient {
    RazorpayClient::new(&RazorpayConfig {
        key_id: "rzp_test_key".to_owned(),
        key_secret: SecretString::from(KEY_SECRET),
        webhook_secret: Some(SecretString::from(WEBHOOK_SECRET)),
        api_base: "https://api.razorpay.com/v1".to_owned(),
    })
}

#[test]
fn test_widget_signature_accepted_only_for_matching_ids() {
    let rzp = client();
    let signature = sign_hex(KEY_SECRET.as_bytes(), b"order_Nx1|pay_Qa9").unwrap();

    assert!(
        rzp.verify_payment_signature("order_Nx1", "pay_Qa9", &signature)
            .is_ok()
    );
    assert!(matches!(
        rzp.verify_payment_signature("order_Nx1", "pay_OTHER", &signature),
        Err(RazorpayError::InvalidSignature)
    ));
    assert!(matches!(
        rzp.verify_payment_signature("order_Nx1", "pay_Qa9", "not-hex"),
        Err(RazorpayError::InvalidSignature)
    ));
}

#[test]
fn test_signed_webhook_parses_into_event() {
    let body = br#"{
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": "pay_Qa9",
                    "order_id": "order_Nx1",
                    "status": "captured",
                    "amount": 53095
                }
            }
        }
    }"#;
    let signature = sign_hex(WEBHOOK_SECRET.as_bytes(), body).unwrap();

    client().verify_webhook_signature(body, &signature).unwrap();

    let event: WebhookEvent = serde_json::from_slice(body).unwrap();
    assert_eq!(event.event, "payment.captured");
    let payment = event.payload.payment.unwrap().entity;
    assert_eq!(payment.id, "pay_Qa9");
    assert_eq!(payment.order_id.as_deref(), Some("order_Nx1"));
}

#[test]
fn test_tampered_webhook_rejected() {
    let body = br#"{"event":"payment.failed","payload":{}}"#;
    let signature = sign_hex(WEBHOOK_SECRET.as_bytes(), body).unwrap();
    let tampered = br#"{"event":"payment.captured","payload":{}}"#;

    assert!(matches!(
        client().verify_webhook_signature(tampered, &signature),
        Err(RazorpayError::InvalidSignature)
    ));
}

fn vault(byte: u8) -> CardVault {
    let key = SecretString::from(STANDARD.encode([byte; 32]));
    CardVault::from_base64_key(&key).unwrap()
}

#[test]
fn test_sealed_card_opens_only_with_same_key() {
    let details = CardDetails {
        gateway_token: "token_HJk21".to_owned(),
        expiry_month: 8,
        expiry_year: 2029,
        holder_name: "Asha Rao".to_owned(),
    };

    let sealed = vault(7).seal(&details).unwrap();
    assert!(!sealed.contains("token_HJk21"));
    assert_eq!(vault(7).open(&sealed).unwrap(), details);
    assert!(matches!(vault(8).open(&sealed), Err(VaultError::Corrupt)));
}

#[test]
fn test_short_vault_key_rejected() {
    let key = SecretString::from(STANDARD.encode([1_u8; 16]));
    assert!(matches!(
        CardVault::from_base64_key(&key),
        Err(VaultError::InvalidKey)
    ));
}
