//! Authentication route handlers.
//!
//! Sign-up and sign-in store the backend session in the visitor's session
//! and raise the first-login flag, so the next cart request merges the
//! local cart into the account.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::error::{AppError, add_breadcrumb, clear_sentry_user};
use crate::middleware::{OptionalAuth, clear_session, sign_in_session};
use crate::models::SessionUser;
use crate::services::auth::{AuthService, SignUp};
use crate::state::AppState;

/// Sign-in form.
#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

/// Session info returned to the browser.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<SessionUser>,
    /// A local cart is waiting to be merged.
    pub merge_pending: bool,
}

/// Register and sign in.
///
/// POST /api/auth/sign-up
///
/// # Errors
///
/// 400 for invalid input, 403 for a disallowed role, 409 if the email is
/// already registered.
#[instrument(skip(state, session, form), fields(role = %form.role))]
pub async fn sign_up(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignUp>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let tokens = AuthService::new(state.supabase()).sign_up(&form).await?;
    let auth = sign_in_session(&session, &tokens).await?;

    info!(user_id = %auth.user.id, "User signed up");
    add_breadcrumb("auth", "sign up", None);
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user: Some(auth.user),
            merge_pending: auth.is_first_login,
        }),
    ))
}

/// Sign in with email and password.
///
/// POST /api/auth/sign-in
///
/// # Errors
///
/// 401 for wrong credentials.
#[instrument(skip(state, session, form))]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignInForm>,
) -> Result<Json<SessionResponse>, AppError> {
    let tokens = AuthService::new(state.supabase())
        .sign_in(&form.email, &form.password)
        .await?;
    let auth = sign_in_session(&session, &tokens).await?;

    info!(user_id = %auth.user.id, "User signed in");
    add_breadcrumb("auth", "sign in", None);
    Ok(Json(SessionResponse {
        user: Some(auth.user),
        merge_pending: auth.is_first_login,
    }))
}

/// Sign out, revoking the backend session and clearing the visitor's
/// session (auth and local cart).
///
/// POST /api/auth/sign-out
///
/// # Errors
///
/// Returns an error only if the session store fails.
#[instrument(skip_all)]
pub async fn sign_out(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<StatusCode, AppError> {
    if let Some(user) = user {
        // Local sign-out still happens when the backend refuses.
        if let Err(e) = AuthService::new(state.supabase())
            .sign_out(&user.auth.access_token)
            .await
        {
            warn!(error = %e, "Backend sign-out failed");
        }
        info!(user_id = %user.id(), "User signed out");
    }
    clear_session(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// Current session.
///
/// GET /api/auth/session
pub async fn session_info(OptionalAuth(user): OptionalAuth) -> Json<SessionResponse> {
    Json(SessionResponse {
        merge_pending: user.as_ref().is_some_and(|u| u.auth.is_first_login),
        user: user.map(|u| u.auth.user),
    })
}
