//! Authentication middleware and extractors.
//!
//! The visitor's [`AuthState`] lives in the session. Extractors load it,
//! refresh the access token when it is about to expire, and gate handlers
//! by role:
//!
//! | Extractor       | Anonymous | Buyer | Seller | Admin |
//! |-----------------|-----------|-------|--------|-------|
//! | `OptionalAuth`  | yes       | yes   | yes    | yes   |
//! | `BuyerAccess`   | yes       | yes   | 403    | 403   |
//! | `RequireAuth`   | 401       | yes   | yes    | yes   |
//! | `RequireSeller` | 401       | 403   | yes    | 403   |
//! | `RequireAdmin`  | 401       | 403   | 403    | yes   |

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use shopfront_core::{Cart, Role, UserId};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::error::{AppError, set_sentry_user};
use crate::models::{AuthState, session_keys};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;
use crate::supabase::{AuthSessionTokens, SupabaseClient};

/// A signed-in visitor with a usable access token.
#[derive(Clone)]
pub struct CurrentUser {
    pub auth: AuthState,
    /// Backend client acting as this user.
    pub client: SupabaseClient,
    pub session: Session,
}

impl CurrentUser {
    #[must_use]
    pub const fn id(&self) -> UserId {
        self.auth.user_id()
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.auth.role()
    }
}

/// Extractor that optionally gets the current user.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(OptionalAuth(user): OptionalAuth) -> impl IntoResponse {
///     match user {
///         Some(u) => format!("Hello, {}!", u.auth.user.display_name),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct OptionalAuth(pub Option<CurrentUser>);

/// Extractor that requires a signed-in user of any role (401 otherwise).
pub struct RequireAuth(pub CurrentUser);

/// Extractor for buyer areas: anonymous visitors and buyers (403 otherwise).
pub struct BuyerAccess(pub Option<CurrentUser>);

/// Extractor that requires role seller.
pub struct RequireSeller(pub CurrentUser);

/// Extractor that requires role admin.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = session_from(parts)?;
        let Some(auth) = load_auth(&session, state).await? else {
            return Ok(Self(None));
        };
        set_sentry_user(&auth.user.id, auth.user.email.as_deref());
        let client = state.supabase().as_user(&auth.access_token);
        Ok(Self(Some(CurrentUser {
            auth,
            client,
            session,
        })))
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let OptionalAuth(user) = OptionalAuth::from_request_parts(parts, state).await?;
        user.map(Self)
            .ok_or_else(|| AppError::Unauthorized("Sign in required".into()))
    }
}

impl FromRequestParts<AppState> for BuyerAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let OptionalAuth(user) = OptionalAuth::from_request_parts(parts, state).await?;
        match user {
            Some(user) if user.role() != Role::Buyer => Err(AppError::Forbidden(
                "Only buyers can use the cart and checkout".into(),
            )),
            user => Ok(Self(user)),
        }
    }
}

impl FromRequestParts<AppState> for RequireSeller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Seller).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Admin).await.map(Self)
    }
}

async fn require_role(
    parts: &mut Parts,
    state: &AppState,
    role: Role,
) -> Result<CurrentUser, AppError> {
    let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
    if user.role() == role {
        Ok(user)
    } else {
        Err(AppError::Forbidden(format!("Requires role {role}")))
    }
}

fn session_from(parts: &Parts) -> Result<Session, AppError> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal("session layer missing".into()))
}

/// Read the auth state, refreshing tokens that are about to expire.
///
/// A rejected refresh token signs the visitor out.
async fn load_auth(session: &Session, state: &AppState) -> Result<Option<AuthState>, AppError> {
    let Some(auth) = session.get::<AuthState>(session_keys::AUTH).await? else {
        return Ok(None);
    };
    if !auth.needs_refresh(Utc::now().timestamp()) {
        return Ok(Some(auth));
    }

    match AuthService::new(state.supabase())
        .refresh(&auth.refresh_token)
        .await
    {
        Ok(tokens) => {
            debug!(user_id = %auth.user.id, "Access token refreshed");
            let auth = auth.refreshed(&tokens);
            session.insert(session_keys::AUTH, &auth).await?;
            Ok(Some(auth))
        }
        Err(AuthError::SessionExpired) => {
            warn!(user_id = %auth.user.id, "Refresh token rejected, signing out");
            session.remove::<AuthState>(session_keys::AUTH).await?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Store a fresh sign-in in the session, cycling the session id.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn sign_in_session(
    session: &Session,
    tokens: &AuthSessionTokens,
) -> Result<AuthState, tower_sessions::session::Error> {
    session.cycle_id().await?;
    let auth = AuthState::signed_in(tokens);
    session.insert(session_keys::AUTH, &auth).await?;
    Ok(auth)
}

/// Drop everything from the session (sign-out).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_session(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

/// The local (pre-login) cart.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn local_cart(session: &Session) -> Result<Cart, tower_sessions::session::Error> {
    Ok(session
        .get::<Cart>(session_keys::LOCAL_CART)
        .await?
        .unwrap_or_default())
}

/// Replace the local cart.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn store_local_cart(
    session: &Session,
    cart: &Cart,
) -> Result<(), tower_sessions::session::Error> {
    if cart.is_empty() {
        session.remove::<Cart>(session_keys::LOCAL_CART).await?;
        return Ok(());
    }
    session.insert(session_keys::LOCAL_CART, cart).await
}
