//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kirana_core::{Email, UserId, UserRole};

use super::{ValidationError, optional, required};

/// Longest display name accepted.
pub const MAX_NAME_LEN: usize = 100;

/// A registered shopper or administrator.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether this user may use `/api/admin`.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Profile fields a user may change about themselves.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl ProfileUpdate {
    /// Normalise and validate the update.
    ///
    /// Returns the trimmed name (if given) and the phone number with
    /// separators stripped. An empty phone clears the stored number.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank or overlong name, or a phone
    /// number that is not 10 to 15 digits.
    pub fn normalise(&self) -> Result<(Option<String>, Option<Option<String>>), ValidationError> {
        let name = self
            .name
            .as_deref()
            .map(validate_name)
            .transpose()?;

        let phone = self
            .phone
            .as_deref()
            .map(|p| optional(Some(p)).map(|p| normalise_phone(&p)).transpose())
            .transpose()?;

        Ok((name, phone))
    }
}

/// Validate a display name.
///
/// # Errors
///
/// Returns `ValidationError` if the name is blank or too long.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = required(name, "name")?;
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

/// Strip spaces, dashes and a leading `+` from a phone number.
///
/// # Errors
///
/// Returns `ValidationError` unless 10 to 15 digits remain.
pub fn normalise_phone(phone: &str) -> Result<String, ValidationError> {
    let trimmed = phone.trim();
    let (plus, rest) = trimmed
        .strip_prefix('+')
        .map_or(("", trimmed), |rest| ("+", rest));
    let digits: String = rest.chars().filter(|c| !matches!(c, ' ' | '-')).collect();

    if !(10..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::new("phone must contain 10 to 15 digits"));
    }
    Ok(format!("{plus}{digits}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_phone() {
        assert_eq!(normalise_phone("98765 43210").unwrap(), "9876543210");
        assert_eq!(normalise_phone("+91-98765-43210").unwrap(), "+919876543210");
        assert!(normalise_phone("12345").is_err());
        assert!(normalise_phone("98765abcde").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Asha ").unwrap(), "Asha");
        assert!(validate_name("").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_profile_update_clears_blank_phone() {
        let update = ProfileUpdate {
            name: None,
            phone: Some("  ".to_owned()),
        };
        let (name, phone) = update.normalise().unwrap();
        assert_eq!(name, None);
        assert_eq!(phone, Some(None));
    }

    #[test]
    fn test_profile_update_validates_phone() {
        let update = ProfileUpdate {
            name: Some("Ravi".to_owned()),
            phone: Some("123".to_owned()),
        };
        assert!(update.normalise().is_err());
    }
}
