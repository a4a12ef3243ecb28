//! Account profile for buyers and sellers.
//!
//! Profile data lives in the auth user's metadata; avatars go to the public
//! `users` bucket.

use chrono::Utc;
use serde::Deserialize;
use shopfront_core::UserId;
use tracing::{info, instrument, warn};

use super::ServiceError;
use super::auth::{AuthError, validate_password};
use super::images::ImageUpload;
use crate::cache::{CacheTag, QueryCache};
use crate::models::Profile;
use crate::supabase::{SupabaseClient, UserAttributes};

/// Storage bucket for avatars.
pub const AVATAR_BUCKET: &str = "users";

/// Profile form. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Profile operations for one signed-in user.
pub struct ProfileService<'a> {
    client: &'a SupabaseClient,
    cache: &'a QueryCache,
    user: UserId,
}

impl<'a> ProfileService<'a> {
    /// `client` must carry the user's access token.
    #[must_use]
    pub const fn new(client: &'a SupabaseClient, cache: &'a QueryCache, user: UserId) -> Self {
        Self {
            client,
            cache,
            user,
        }
    }

    fn cache_key(&self) -> String {
        format!("profile:{}", self.user)
    }

    /// The user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    pub async fn get(&self) -> Result<Profile, ServiceError> {
        self.cache
            .get_or_fetch(
                self.cache_key(),
                vec![CacheTag::Profile(self.user)],
                || async { Ok::<_, ServiceError>(Profile::from(&self.client.get_user().await?)) },
            )
            .await
    }

    /// Change display name and/or phone.
    ///
    /// The cached profile shows the new values while the write is in
    /// flight and is restored if it fails.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` for a blank display name, or an error
    /// if the backend call fails.
    #[instrument(skip(self, update), fields(user_id = %self.user))]
    pub async fn update(&self, update: &ProfileUpdate) -> Result<Profile, ServiceError> {
        let mut data = serde_json::Map::new();
        if let Some(name) = &update.display_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ServiceError::Invalid("display name cannot be blank".into()));
            }
            data.insert("display_name".into(), name.into());
        }
        if let Some(phone) = &update.phone {
            data.insert("phone".into(), phone.trim().into());
        }
        if data.is_empty() {
            return self.get().await;
        }

        let key = self.cache_key();
        let patch = self
            .cache
            .patch::<Profile, _>(&key, |profile| {
                if let Some(name) = data.get("display_name").and_then(|v| v.as_str()) {
                    name.clone_into(&mut profile.display_name);
                }
                if let Some(phone) = data.get("phone").and_then(|v| v.as_str()) {
                    profile.phone = Some(phone.to_owned());
                }
            })
            .await;

        let attributes = UserAttributes {
            data: Some(serde_json::Value::Object(data)),
            ..UserAttributes::default()
        };
        match self.client.update_user(&attributes).await {
            Ok(user) => {
                let profile = Profile::from(&user);
                self.cache
                    .insert(key, vec![CacheTag::Profile(self.user)], &profile)
                    .await;
                info!("Profile updated");
                Ok(profile)
            }
            Err(e) => {
                if let Some(patch) = patch {
                    warn!(error = %e, "Profile update failed, restoring cached profile");
                    patch.undo(self.cache).await;
                }
                Err(e.into())
            }
        }
    }

    /// Set a new password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` for short passwords, or an error if
    /// the backend call fails.
    #[instrument(skip(self, password), fields(user_id = %self.user))]
    pub async fn change_password(&self, password: &str) -> Result<(), AuthError> {
        validate_password(password)?;
        let attributes = UserAttributes {
            password: Some(password.to_owned()),
            ..UserAttributes::default()
        };
        self.client.update_user(&attributes).await?;
        info!("Password changed");
        Ok(())
    }

    /// Upload a new avatar and point the profile at it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-image or oversized files, or an
    /// error if a backend call fails.
    #[instrument(skip(self, image), fields(user_id = %self.user))]
    pub async fn upload_avatar(
        &self,
        image: ImageUpload,
        max_bytes: usize,
    ) -> Result<Profile, ServiceError> {
        image.validate(max_bytes)?;
        let path = avatar_path(self.user, Utc::now().timestamp_millis());
        let url = self
            .client
            .upload(AVATAR_BUCKET, &path, image.bytes, &image.content_type, false)
            .await?;

        let attributes = UserAttributes {
            data: Some(serde_json::json!({ "avatar_url": url.as_str() })),
            ..UserAttributes::default()
        };
        let user = self.client.update_user(&attributes).await?;
        let profile = Profile::from(&user);
        self.cache
            .insert(self.cache_key(), vec![CacheTag::Profile(self.user)], &profile)
            .await;
        Ok(profile)
    }
}

/// Object path of an avatar uploaded at `millis`.
#[must_use]
pub fn avatar_path(user: UserId, millis: i64) -> String {
    format!("{user}-{millis}.webp")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_path() {
        let user = UserId::new(uuid::Uuid::nil());
        assert_eq!(
            avatar_path(user, 1_700_000_000_123),
            "00000000-0000-0000-0000-000000000000-1700000000123.webp"
        );
    }

    #[test]
    fn test_update_form_fields_optional() {
        let update: ProfileUpdate =
            serde_json::from_value(serde_json::json!({ "phone": "555" }))
                .unwrap_or_else(|e| panic!("{e}"));
        assert!(update.display_name.is_none());
        assert_eq!(update.phone.as_deref(), Some("555"));
    }
}
