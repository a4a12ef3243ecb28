//! Authentication service.
//!
//! Password sign-up and sign-in against the managed auth provider, plus
//! token refresh and sign-out. Session bookkeeping (storing the tokens,
//! cycling the session id) is left to the route handlers.

mod error;

pub use error::AuthError;

use serde::Deserialize;
use shopfront_core::{Email, Role};
use tracing::{info, instrument};

use crate::supabase::{
    AuthSessionTokens, AuthUser, Query, SupabaseClient, SupabaseError, UserMetadata,
};

/// Minimum password length accepted by the auth provider.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Sign-up form.
#[derive(Debug, Clone, Deserialize)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
}

/// Authentication service.
pub struct AuthService<'a> {
    client: &'a SupabaseClient,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(client: &'a SupabaseClient) -> Self {
        Self { client }
    }

    /// Register a user and sign them in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::RoleNotAllowed` for admin sign-ups and
    /// `AuthError::MissingField` without a display name.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, form), fields(role = %form.role))]
    pub async fn sign_up(&self, form: &SignUp) -> Result<AuthSessionTokens, AuthError> {
        let email = Email::parse(&form.email)?;
        validate_password(&form.password)?;
        if form.role == Role::Admin {
            return Err(AuthError::RoleNotAllowed(form.role));
        }
        let display_name = form.display_name.trim();
        if display_name.is_empty() {
            return Err(AuthError::MissingField("display_name"));
        }

        let existing = Query::table("users")
            .select("email")
            .eq("email", email.as_str());
        if self
            .client
            .select_single::<serde_json::Value>(&existing)
            .await?
            .is_some()
        {
            return Err(AuthError::UserAlreadyExists);
        }

        let metadata = UserMetadata {
            display_name: Some(display_name.to_owned()),
            role: Some(form.role),
            avatar_url: Some(email.gravatar_url()),
            ..UserMetadata::default()
        };
        self.client
            .sign_up(email.as_str(), &form.password, &metadata)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    AuthError::UserAlreadyExists
                } else {
                    AuthError::Backend(e)
                }
            })?;
        info!("Account created");

        self.sign_in(email.as_str(), &form.password).await
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSessionTokens, AuthError> {
        let email = Email::parse(email)?;
        self.client
            .sign_in_with_password(email.as_str(), password)
            .await
            .map_err(|e| match e {
                SupabaseError::Unauthorized(_) => AuthError::InvalidCredentials,
                other => AuthError::Backend(other),
            })
    }

    /// Exchange a refresh token for new tokens.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionExpired` if the refresh token was rejected.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSessionTokens, AuthError> {
        self.client
            .refresh_session(refresh_token)
            .await
            .map_err(|e| match e {
                SupabaseError::Unauthorized(_) => AuthError::SessionExpired,
                other => AuthError::Backend(other),
            })
    }

    /// Revoke the session behind `access_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.client.as_user(access_token).sign_out().await?;
        Ok(())
    }

    /// The user owning `access_token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected or the call fails.
    pub async fn current_user(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        Ok(self.client.as_user(access_token).get_user().await?)
    }
}

/// Validate password requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
