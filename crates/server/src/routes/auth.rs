//! Authentication handlers: register, login, logout, profile.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::auth::{RequireAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::AuthService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterPayload {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordPayload {
    pub current_password: String,
    pub new_password: String,
}

/// Create an account and log it in.
#[instrument(skip_all, fields(email = %payload.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<CurrentUser>)> {
    let auth = AuthService::new(state.pool());
    let user = auth
        .register(&payload.email, &payload.display_name, &payload.password)
        .await?;

    let current = CurrentUser::from(&user);
    set_current_user(&session, &current)
        .await
        .map_err(crate::services::auth::AuthError::Session)?;
    set_sentry_user(&current.id, Some(current.email.as_str()));

    info!(user_id = %user.id, "user registered");

    if let Some(email) = state.email() {
        let email = email.clone();
        let to = user.email.as_str().to_string();
        let name = user.display_name.clone();
        crate::services::email::EmailService::spawn_send(async move {
            email.send_welcome(&to, &name).await
        });
    }

    Ok((StatusCode::CREATED, Json(current)))
}

/// Login with email and password.
#[instrument(skip_all, fields(email = %payload.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<CurrentUser>> {
    let auth = AuthService::new(state.pool());
    let user = auth.login(&payload.email, &payload.password).await?;

    // Rotate the session id on privilege change.
    session
        .cycle_id()
        .await
        .map_err(crate::services::auth::AuthError::Session)?;

    let current = CurrentUser::from(&user);
    set_current_user(&session, &current)
        .await
        .map_err(crate::services::auth::AuthError::Session)?;
    set_sentry_user(&current.id, Some(current.email.as_str()));

    info!(user_id = %user.id, "user logged in");

    Ok(Json(current))
}

/// Logout and destroy the session.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session)
        .await
        .map_err(crate::services::auth::AuthError::Session)?;
    session
        .flush()
        .await
        .map_err(crate::services::auth::AuthError::Session)?;
    clear_sentry_user();

    Ok(StatusCode::NO_CONTENT)
}

/// Return the logged-in user's profile.
#[instrument(skip_all)]
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<crate::models::user::User>> {
    let auth = AuthService::new(state.pool());
    let user = auth.get_user(user.id).await?;
    Ok(Json(user))
}

/// Change the logged-in user's password.
#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<StatusCode> {
    if payload.current_password == payload.new_password {
        return Err(AppError::BadRequest(
            "new password must differ from the current one".to_string(),
        ));
    }

    let auth = AuthService::new(state.pool());
    auth.change_password(user.id, &payload.current_password, &payload.new_password)
        .await?;

    info!(user_id = %user.id, "password changed");

    Ok(StatusCode::NO_CONTENT)
}
