//! Saved payment methods.
//!
//! Only the card network and last four digits are kept in clear text. The
//! gateway token, expiry and holder name travel as [`CardDetails`] and are
//! sealed before they reach the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kirana_core::{PaymentMethodId, UserId};

use super::{ValidationError, required};

/// Card networks accepted for saved cards.
pub const CARD_NETWORKS: [&str; 5] = ["visa", "mastercard", "rupay", "amex", "diners"];

/// A saved card as stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub user_id: UserId,
    pub card_network: String,
    pub last4: String,
    #[serde(skip_serializing)]
    pub encrypted_details: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Sensitive card details, sealed at rest.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    /// Token issued by the payment gateway for the tokenised card.
    pub gateway_token: String,
    pub expiry_month: u8,
    pub expiry_year: u16,
    pub holder_name: String,
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("gateway_token", &"[REDACTED]")
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("holder_name", &"[REDACTED]")
            .finish()
    }
}

/// Request body for saving a card.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPaymentMethod {
    pub card_network: String,
    pub last4: String,
    #[serde(flatten)]
    pub details: CardDetails,
    #[serde(default)]
    pub is_default: bool,
}

impl NewPaymentMethod {
    /// Check the request and normalise the network name.
    ///
    /// `current_year`/`current_month` decide whether the card has expired.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for unknown networks, anything other than
    /// exactly four digits in `last4`, a gateway token that looks like a card
    /// number, or an expired card.
    pub fn normalised(
        mut self,
        current_year: u16,
        current_month: u8,
    ) -> Result<Self, ValidationError> {
        self.card_network = self.card_network.trim().to_lowercase();
        if !CARD_NETWORKS.contains(&self.card_network.as_str()) {
            return Err(ValidationError::new("unsupported card network"));
        }

        self.last4 = self.last4.trim().to_owned();
        if self.last4.len() != 4 || !self.last4.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::new("last4 must be exactly 4 digits"));
        }

        self.details.gateway_token = required(&self.details.gateway_token, "gateway token")?;
        if looks_like_card_number(&self.details.gateway_token) {
            return Err(ValidationError::new(
                "card numbers are not accepted; send the gateway token",
            ));
        }
        self.details.holder_name = required(&self.details.holder_name, "holder name")?;

        if !(1..=12).contains(&self.details.expiry_month) {
            return Err(ValidationError::new("expiry month must be 1-12"));
        }
        if (self.details.expiry_year, self.details.expiry_month) < (current_year, current_month) {
            return Err(ValidationError::new("card has expired"));
        }

        Ok(self)
    }
}

/// 12 to 19 digits, optionally separated by spaces or dashes.
fn looks_like_card_number(value: &str) -> bool {
    let digits: Vec<char> = value.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    (12..=19).contains(&digits.len()) && digits.iter().all(char::is_ascii_digit)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(token: &str) -> NewPaymentMethod {
        NewPaymentMethod {
            card_network: " VISA ".to_owned(),
            last4: "4242".to_owned(),
            details: CardDetails {
                gateway_token: token.to_owned(),
                expiry_month: 8,
                expiry_year: 2030,
                holder_name: "Arjun Rao".to_owned(),
            },
            is_default: false,
        }
    }

    #[test]
    fn test_normalised_accepts_token() {
        let method = request("token_Hx9aBcDeFg").normalised(2026, 10).unwrap();
        assert_eq!(method.card_network, "visa");
    }

    #[test]
    fn test_rejects_full_card_number() {
        assert!(request("4242 4242 4242 4242").normalised(2026, 10).is_err());
        assert!(request("4242424242424242").normalised(2026, 10).is_err());
    }

    #[test]
    fn test_rejects_expired_card() {
        let mut req = request("token_abc");
        req.details.expiry_year = 2026;
        req.details.expiry_month = 9;
        assert!(req.normalised(2026, 10).is_err());
    }

    #[test]
    fn test_rejects_bad_last4() {
        let mut req = request("token_abc");
        req.last4 = "42a2".to_owned();
        assert!(req.normalised(2026, 10).is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let details = request("token_secret").details;
        assert!(!format!("{details:?}").contains("token_secret"));
    }
}
