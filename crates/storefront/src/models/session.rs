//! Session-related types.
//!
//! Types stored in the visitor's session: the authentication state after
//! sign-in and the local cart kept before sign-in.

use serde::{Deserialize, Serialize};
use shopfront_core::{Role, UserId};

use crate::supabase::{AuthSessionTokens, AuthUser};

/// Refresh access tokens this many seconds before they expire.
const REFRESH_MARGIN_SECS: i64 = 30;

/// Session-stored user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub email: Option<String>,
    pub display_name: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

impl From<&AuthUser> for SessionUser {
    fn from(user: &AuthUser) -> Self {
        Self {
            id: UserId::new(user.id),
            email: user.email.clone(),
            display_name: user.display_name(),
            role: user.role(),
            avatar_url: user.user_metadata.avatar_url.clone(),
        }
    }
}

/// Authentication state of a signed-in visitor.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthState {
    pub user: SessionUser,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry, unix seconds.
    pub expires_at: i64,
    /// Set at sign-in; cleared once the local cart was merged.
    pub is_first_login: bool,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("user", &self.user)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("is_first_login", &self.is_first_login)
            .finish()
    }
}

impl AuthState {
    /// State right after a successful sign-in.
    #[must_use]
    pub fn signed_in(tokens: &AuthSessionTokens) -> Self {
        Self {
            user: SessionUser::from(&tokens.user),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at(),
            is_first_login: true,
        }
    }

    /// Replace the tokens after a refresh, keeping the merge flag.
    #[must_use]
    pub fn refreshed(self, tokens: &AuthSessionTokens) -> Self {
        Self {
            user: SessionUser::from(&tokens.user),
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at(),
            is_first_login: self.is_first_login,
        }
    }

    /// Whether the access token is expired (or about to be) at `now`.
    #[must_use]
    pub const fn needs_refresh(&self, now: i64) -> bool {
        self.expires_at - REFRESH_MARGIN_SECS <= now
    }

    /// Signed-in user's id.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user.id
    }

    /// Signed-in user's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.user.role
    }
}

/// Session keys.
pub mod session_keys {
    /// Key for the [`AuthState`](super::AuthState) of a signed-in visitor.
    pub const AUTH: &str = "auth";

    /// Key for the local (pre-login) cart.
    pub const LOCAL_CART: &str = "local_cart";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tokens(role: &str) -> AuthSessionTokens {
        serde_json::from_value(serde_json::json!({
            "access_token": "access-abc",
            "refresh_token": "refresh-abc",
            "expires_in": 3600,
            "expires_at": 1_900_000_000,
            "user": {
                "id": "6f1c1b8e-7c0e-4a4a-9d2e-1d7a0b7f2a11",
                "email": "sam@example.com",
                "user_metadata": { "role": role }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_signed_in_sets_first_login() {
        let state = AuthState::signed_in(&tokens("seller"));
        assert!(state.is_first_login);
        assert_eq!(state.role(), Role::Seller);
        assert_eq!(state.user.display_name, "sam@example.com");
        assert_eq!(state.expires_at, 1_900_000_000);
    }

    #[test]
    fn test_refresh_keeps_merge_flag() {
        let mut state = AuthState::signed_in(&tokens("buyer"));
        state.is_first_login = false;
        let refreshed = state.refreshed(&tokens("buyer"));
        assert!(!refreshed.is_first_login);
    }

    #[test]
    fn test_needs_refresh_margin() {
        let state = AuthState::signed_in(&tokens("buyer"));
        assert!(!state.needs_refresh(1_900_000_000 - 31));
        assert!(state.needs_refresh(1_900_000_000 - 30));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let state = AuthState::signed_in(&tokens("buyer"));
        let debug = format!("{state:?}");
        assert!(!debug.contains("access-abc"));
        assert!(!debug.contains("refresh-abc"));
    }
}
