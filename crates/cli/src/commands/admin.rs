//! Admin account commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin account with a password
//! kirana-cli admin create -e admin@example.com -n "Admin Name" -p 'long-password-1'
//!
//! # Promote an existing shopper
//! kirana-cli admin promote -e shopper@example.com
//! ```

use kirana_core::{Email, UserId, UserRole};
use kirana_storefront::db::{RepositoryError, UserRepository};
use kirana_storefront::services::auth::{AuthError, AuthService};
use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Account could not be created.
    #[error("{0}")]
    Auth(#[from] AuthError),

    /// Repository failure.
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with that email.
    #[error("No account found with email: {0}")]
    UnknownUser(String),
}

/// Create a new admin account.
///
/// # Returns
///
/// The ID of the created user.
///
/// # Errors
///
/// Returns `AdminError::Auth` if the email is taken or the password is weak.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<UserId, AdminError> {
    let pool = connect().await?;

    tracing::info!("Creating admin user: {}", email);
    let user = AuthService::new(&pool)
        .create_account(name, email, password, UserRole::Admin)
        .await?;

    tracing::info!(
        "Admin user created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}

/// Give an existing account the admin role.
///
/// # Errors
///
/// Returns `AdminError::UnknownUser` if no account has this email.
pub async fn promote(email: &str) -> Result<(), AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AdminError::UnknownUser(email.as_str().to_owned()))?;

    if user.role == UserRole::Admin {
        tracing::info!("{} is already an admin", email.as_str());
        return Ok(());
    }

    users.set_role(user.id, UserRole::Admin).await?;
    tracing::info!("Promoted {} (ID {}) to admin", email.as_str(), user.id);
    Ok(())
}
