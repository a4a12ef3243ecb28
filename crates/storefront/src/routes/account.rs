//! Account route handlers: profile, avatar, order history and tracking.
//!
//! Profile handlers are shared with the seller settings page, which wraps
//! them behind the seller guard.

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use shopfront_core::OrderId;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::{CurrentUser, RequireAuth};
use crate::models::{Profile, session_keys};
use crate::routes::uploads::UploadForm;
use crate::services::orders::{OrderHistory, OrderService, OrderTracking};
use crate::services::profile::{ProfileService, ProfileUpdate};
use crate::state::AppState;

/// Multipart field carrying the avatar file.
pub const AVATAR_FIELD: &str = "avatar";

fn profiles<'a>(state: &'a AppState, user: &'a CurrentUser) -> ProfileService<'a> {
    ProfileService::new(&user.client, state.cache(), user.id())
}

/// Keep the session's copy of the user in step with the profile.
async fn remember_profile(user: &CurrentUser, profile: &Profile) -> Result<(), AppError> {
    let mut auth = user.auth.clone();
    auth.user.display_name.clone_from(&profile.display_name);
    auth.user.avatar_url.clone_from(&profile.avatar_url);
    user.session.insert(session_keys::AUTH, &auth).await?;
    Ok(())
}

pub(crate) async fn read_profile(state: &AppState, user: &CurrentUser) -> Result<Profile, AppError> {
    Ok(profiles(state, user).get().await?)
}

pub(crate) async fn write_profile(
    state: &AppState,
    user: &CurrentUser,
    update: &ProfileUpdate,
) -> Result<Profile, AppError> {
    let profile = profiles(state, user).update(update).await?;
    remember_profile(user, &profile).await?;
    Ok(profile)
}

pub(crate) async fn store_avatar(
    state: &AppState,
    user: &CurrentUser,
    multipart: Multipart,
) -> Result<Profile, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let image = form
        .take_file(AVATAR_FIELD)
        .ok_or_else(|| AppError::BadRequest(format!("Missing `{AVATAR_FIELD}` file")))?;
    let profile = profiles(state, user)
        .upload_avatar(image, state.config().max_upload_bytes)
        .await?;
    remember_profile(user, &profile).await?;
    Ok(profile)
}

/// GET /api/account/profile
///
/// # Errors
///
/// 401 when signed out.
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(read_profile(&state, &user).await?))
}

/// PUT /api/account/profile
///
/// # Errors
///
/// 400 for a blank display name, 401 when signed out.
#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(write_profile(&state, &user, &update).await?))
}

/// Multipart upload with an `avatar` file.
///
/// POST /api/account/avatar
///
/// # Errors
///
/// 400 for a missing or non-image file, 413 for an oversized one.
#[instrument(skip_all)]
pub async fn upload_avatar(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Json<Profile>, AppError> {
    Ok(Json(store_avatar(&state, &user, multipart).await?))
}

/// Orders of the signed-in buyer with totals and total spend.
///
/// GET /api/account/orders
///
/// # Errors
///
/// 401 when signed out.
#[instrument(skip_all)]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<OrderHistory>, AppError> {
    let history = OrderService::new(&user.client, state.cache())
        .history(user.id())
        .await?;
    Ok(Json(history))
}

/// GET /api/orders/{id}/tracking
///
/// # Errors
///
/// 401 when signed out, 403 for someone else's order, 404 for an unknown
/// one.
#[instrument(skip(state, user))]
pub async fn tracking(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<OrderId>,
) -> Result<Json<OrderTracking>, AppError> {
    let tracking = OrderService::new(&user.client, state.cache())
        .tracking(&order_id, user.id())
        .await?;
    Ok(Json(tracking))
}
