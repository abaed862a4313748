//! Shopper email addresses.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Why an address was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email is required")]
    Empty,
    #[error("email must be at most {max} characters")]
    TooLong { max: usize },
    /// Not exactly one `@` with text on both sides.
    #[error("email must look like name@domain")]
    Malformed,
}

/// A trimmed, lower-cased email address.
///
/// Accounts are keyed by this value, so `Asha@Example.com` and
/// `asha@example.com` are the same shopper. Only the shape is checked:
/// one `@`, something before it, something after it, and at most 254
/// characters.
///
/// ```
/// use kirana_core::Email;
///
/// let email = Email::parse(" Asha@Example.com ").unwrap();
/// assert_eq!(email.as_str(), "asha@example.com");
/// assert!(Email::parse("asha.example.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Longest address accepted (RFC 5321).
    pub const MAX_LENGTH: usize = 254;

    /// Normalise and check an address.
    ///
    /// # Errors
    ///
    /// Returns `EmailError` when the input is blank, too long or not of the
    /// form `local@domain`.
    pub fn parse(input: &str) -> Result<Self, EmailError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        if trimmed.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        match trimmed.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(trimmed.to_lowercase()))
            }
            _ => Err(EmailError::Malformed),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Email {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

// Stored values were normalised on the way in.
#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Email {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        Ok(Self(<String as sqlx::Decode<sqlx::Postgres>>::decode(value)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Email {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_shapes() {
        for input in [
            "asha@example.com",
            "asha.rao+groceries@example.co.in",
            "a@b.c",
        ] {
            assert!(Email::parse(input).is_ok(), "{input}");
        }
    }

    #[test]
    fn test_same_shopper_regardless_of_case_and_padding() {
        let a = Email::parse("  Asha@Example.COM\n").unwrap();
        let b = Email::parse("asha@example.com").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "asha@example.com");
    }

    #[test]
    fn test_rejections() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        for input in ["asha.example.com", "@example.com", "asha@", "a@b@c.com"] {
            assert_eq!(Email::parse(input), Err(EmailError::Malformed), "{input}");
        }

        let long = format!("{}@example.com", "a".repeat(250));
        assert_eq!(
            Email::parse(&long),
            Err(EmailError::TooLong { max: 254 })
        );
    }

    #[test]
    fn test_serialises_as_plain_string() {
        let email = Email::parse("asha@example.com").unwrap();
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"asha@example.com\"");
        let parsed: Email = serde_json::from_str("\"asha@example.com\"").unwrap();
        assert_eq!(parsed, email);
    }
}
