//! Authentication route handlers.
//!
//! Session-cookie auth: login stores a [`CurrentUser`] in the session,
//! logout flushes it.

use axum::{extract::State, response::IntoResponse};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use super::{ApiJson, done, ok, ok_with};
use crate::db::UserRepository;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::RESET_TOKEN_TTL_MINUTES;
use crate::state::AppState;

/// Registration body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Change-password body.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Forgot-password body.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Reset-password body.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

async fn start_session(session: &Session, user: &User) -> Result<(), AppError> {
    set_current_user(session, &CurrentUser::from(user))
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Register and log in.
///
/// POST /api/auth/register
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .auth()
        .register(&body.name, &body.email, &body.password)
        .await?;
    start_session(&session, &user).await?;

    if let Some(email) = state.email().cloned() {
        let (to, name) = (user.email.as_str().to_owned(), user.name.clone());
        tokio::spawn(async move {
            if let Err(e) = email.send_welcome(&to, &name).await {
                warn!(error = %e, "Failed to send welcome email");
            }
        });
    }

    info!(user_id = %user.id, "User registered");
    Ok((axum::http::StatusCode::CREATED, ok_with("Registered", user)))
}

/// Log in with email and password.
///
/// POST /api/auth/login
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth().login(&body.email, &body.password).await?;
    start_session(&session, &user).await?;

    info!(user_id = %user.id, "User logged in");
    Ok(ok_with("Logged in", user))
}

/// End the session.
///
/// POST /api/auth/logout
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<impl IntoResponse, AppError> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();
    Ok(done("Logged out"))
}

/// The logged-in user's account.
///
/// GET /api/auth/me
#[instrument(skip(state, current), fields(user_id = %current.id))]
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Please log in to continue".to_owned()))?;
    Ok(ok(user))
}

/// Change the password, given the current one.
///
/// PUT /api/auth/password
#[instrument(skip(state, current, body), fields(user_id = %current.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth()
        .change_password(current.id, &body.current_password, &body.new_password)
        .await?;
    Ok(done("Password updated"))
}

/// Email a password reset link.
///
/// POST /api/auth/forgot-password
///
/// Always answers 200 so the endpoint cannot be used to probe for
/// accounts.
#[instrument(skip(state, body))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    match state.auth().start_password_reset(&body.email).await {
        Ok(Some((user, token))) => match state.email().cloned() {
            Some(email) => {
                tokio::spawn(async move {
                    if let Err(e) = email
                        .send_password_reset(
                            user.email.as_str(),
                            &user.name,
                            &token,
                            RESET_TOKEN_TTL_MINUTES,
                        )
                        .await
                    {
                        warn!(user_id = %user.id, error = %e, "Failed to send reset email");
                    }
                });
            }
            None => warn!(user_id = %user.id, "Password reset requested but email is disabled"),
        },
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Password reset request failed"),
    }

    Ok(done(
        "If an account exists for that email, a reset link has been sent",
    ))
}

/// Set a new password with a reset token.
///
/// POST /api/auth/reset-password
#[instrument(skip(state, body))]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = state
        .auth()
        .reset_password(&body.token, &body.password)
        .await?;
    info!(%user_id, "Password reset completed");
    Ok(done("Password has been reset, please log in"))
}
