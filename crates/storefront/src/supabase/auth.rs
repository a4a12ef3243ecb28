//! `GoTrue` calls: sign-up, token grants, logout and user updates.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use shopfront_core::{Cart, Role};
use tracing::instrument;
use uuid::Uuid;

use super::{SupabaseClient, SupabaseError};

/// Application data kept in `user_metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_role",
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart: Option<Cart>,
}

/// Unknown role strings read as "no role" instead of failing the whole user.
fn lenient_role<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Role>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|r| r.parse().ok()))
}

/// A `GoTrue` user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    /// Display name, falling back to the email and then `"User"`.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.user_metadata
            .display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or("User")
            .to_owned()
    }

    /// Role from metadata; accounts without one are buyers.
    #[must_use]
    pub fn role(&self) -> Role {
        self.user_metadata.role.unwrap_or_default()
    }

    /// Server cart from metadata.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.user_metadata.cart.clone().unwrap_or_default()
    }
}

/// Tokens returned by a successful sign-in or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    /// Absolute expiry (unix seconds), when the backend sends it.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl AuthSessionTokens {
    /// Absolute expiry in unix seconds.
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + self.expires_in)
    }
}

/// Fields a signed-in user may change on themselves (`PUT /user`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Keys merged into `user_metadata`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Fields for creating a user with the service role (`POST /admin/users`).
#[derive(Debug, Clone, Serialize)]
pub struct AdminUserAttributes {
    pub email: String,
    pub password: String,
    pub email_confirm: bool,
    pub user_metadata: UserMetadata,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    data: &'a UserMetadata,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

/// Sign-up answers with either a session or a bare user (email confirmation on).
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(Box<AuthSessionTokens>),
    User(Box<AuthUser>),
}

impl SupabaseClient {
    /// Register a user with initial metadata.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Conflict` if the email is taken, or another
    /// error if the request fails.
    #[instrument(skip(self, password, metadata))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &UserMetadata,
    ) -> Result<AuthUser, SupabaseError> {
        let url = self.endpoint("auth/v1/signup")?;
        let body = SignUpBody {
            email,
            password,
            data: metadata,
        };
        let response = self
            .send(self.request(Method::POST, url).json(&body))
            .await?;
        Ok(match Self::json::<SignUpResponse>(response).await? {
            SignUpResponse::Session(session) => session.user,
            SignUpResponse::User(user) => *user,
        })
    }

    /// Password grant.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Unauthorized` for wrong credentials, or
    /// another error if the request fails.
    #[instrument(skip(self, password))]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSessionTokens, SupabaseError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let response = self
            .send(
                self.request(Method::POST, url)
                    .json(&Credentials { email, password }),
            )
            .await
            .map_err(invalid_grant_is_unauthorized)?;
        Self::json(response).await
    }

    /// Exchange a refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Unauthorized` if the refresh token was revoked
    /// or already used.
    #[instrument(skip_all)]
    pub async fn refresh_session(
        &self,
        refresh_token: &str,
    ) -> Result<AuthSessionTokens, SupabaseError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");
        let response = self
            .send(
                self.request(Method::POST, url)
                    .json(&RefreshBody { refresh_token }),
            )
            .await
            .map_err(invalid_grant_is_unauthorized)?;
        Self::json(response).await
    }

    /// Revoke the session of the current bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), SupabaseError> {
        let url = self.endpoint("auth/v1/logout")?;
        self.send(self.request(Method::POST, url)).await?;
        Ok(())
    }

    /// The user owning the current bearer token.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Unauthorized` if the token is missing or expired.
    #[instrument(skip(self))]
    pub async fn get_user(&self) -> Result<AuthUser, SupabaseError> {
        let url = self.endpoint("auth/v1/user")?;
        let response = self.send(self.request(Method::GET, url)).await?;
        Self::json(response).await
    }

    /// Update the current user. Metadata keys in `attributes.data` are merged.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, attributes))]
    pub async fn update_user(&self, attributes: &UserAttributes) -> Result<AuthUser, SupabaseError> {
        let url = self.endpoint("auth/v1/user")?;
        let response = self
            .send(self.request(Method::PUT, url).json(attributes))
            .await?;
        Self::json(response).await
    }

    /// Create a confirmed user. Requires a service role client.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Conflict` if the email is taken, or another
    /// error if the request fails.
    #[instrument(skip(self, attributes), fields(email = %attributes.email))]
    pub async fn admin_create_user(
        &self,
        attributes: &AdminUserAttributes,
    ) -> Result<AuthUser, SupabaseError> {
        let url = self.endpoint("auth/v1/admin/users")?;
        let response = self
            .send(self.request(Method::POST, url).json(attributes))
            .await?;
        Self::json(response).await
    }
}

/// `GoTrue` answers bad credentials with 400 `invalid_grant`.
fn invalid_grant_is_unauthorized(error: SupabaseError) -> SupabaseError {
    match error {
        SupabaseError::Api {
            status: 400,
            message,
            ..
        } => SupabaseError::Unauthorized(message),
        other => other,
    }
}
