//! Account profile shown on the buyer dashboard and seller settings.

use serde::{Deserialize, Serialize};
use shopfront_core::{Role, UserId};

use crate::supabase::AuthUser;

/// Profile of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
}

impl From<&AuthUser> for Profile {
    fn from(user: &AuthUser) -> Self {
        Self {
            id: UserId::new(user.id),
            email: user.email.clone(),
            phone: user
                .user_metadata
                .phone
                .clone()
                .or_else(|| user.phone.clone().filter(|p| !p.is_empty())),
            display_name: user.display_name(),
            avatar_url: user.user_metadata.avatar_url.clone(),
            role: user.role(),
        }
    }
}
