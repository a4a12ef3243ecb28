//! Account creation with the service role.
//!
//! Self sign-up cannot create admins, so the first admin (and any account
//! that should skip email confirmation) is created here.
//!
//! # Usage
//!
//! ```bash
//! shopfront-cli user create -e admin@example.com -n "Admin Name" -r admin
//! ```
//!
//! The password comes from `--password`, then `SHOPFRONT_USER_PASSWORD`,
//! then a prompt on stdin.
//!
//! # Environment Variables
//!
//! - `SUPABASE_URL`, `SUPABASE_ANON_KEY`
//! - `SUPABASE_SERVICE_ROLE_KEY` - service role key (validated)

use std::io::BufRead;

use shopfront_core::{Email, EmailError, Role, UserId};
use shopfront_storefront::config::{ConfigError, SupabaseConfig};
use shopfront_storefront::services::auth::validate_password;
use shopfront_storefront::supabase::{
    AdminUserAttributes, SupabaseClient, SupabaseError, UserMetadata,
};
use thiserror::Error;

/// Environment variable consulted when `--password` is absent.
const PASSWORD_ENV: &str = "SHOPFRONT_USER_PASSWORD";

/// Errors that can occur while creating a user.
#[derive(Debug, Error)]
pub enum UserError {
    /// Configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: buyer, seller, admin")]
    InvalidRole(String),

    /// Password rejected.
    #[error("{0}")]
    WeakPassword(String),

    /// Display name is blank.
    #[error("Display name is required")]
    MissingName,

    /// User already exists.
    #[error("User already exists with email: {0}")]
    UserExists(String),

    /// Reading the password failed.
    #[error("Failed to read password: {0}")]
    Io(#[from] std::io::Error),

    /// Backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] SupabaseError),
}

fn read_password(flag: Option<String>) -> Result<String, UserError> {
    if let Some(password) = flag.or_else(|| std::env::var(PASSWORD_ENV).ok()) {
        return Ok(password);
    }
    #[allow(clippy::print_stderr)]
    {
        eprint!("Password: ");
    }
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

/// Create a confirmed user with `role`.
///
/// # Arguments
///
/// * `email` - Account email
/// * `name` - Display name
/// * `role` - `buyer`, `seller` or `admin`
/// * `password` - Password, or `None` to read it from the environment or stdin
///
/// # Returns
///
/// The new user's id.
///
/// # Errors
///
/// Returns an error for invalid input, a taken email, or a failed backend
/// call.
pub async fn create(
    email: &str,
    name: &str,
    role: &str,
    password: Option<String>,
) -> Result<UserId, UserError> {
    let email = Email::parse(email)?;
    let role: Role = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(UserError::MissingName);
    }
    let password = read_password(password)?;
    validate_password(&password).map_err(|e| UserError::WeakPassword(e.to_string()))?;

    let config = SupabaseConfig::from_env_with_service_role()?;
    let client = SupabaseClient::new(&config).as_service_role()?;

    tracing::info!("Creating user: {} ({})", email, role);

    let attributes = AdminUserAttributes {
        email: email.as_str().to_owned(),
        password,
        email_confirm: true,
        user_metadata: UserMetadata {
            display_name: Some(name.to_owned()),
            role: Some(role),
            avatar_url: Some(email.gravatar_url()),
            ..UserMetadata::default()
        },
    };
    let user = client
        .admin_create_user(&attributes)
        .await
        .map_err(|e| {
            if e.is_conflict() {
                UserError::UserExists(email.as_str().to_owned())
            } else {
                UserError::Backend(e)
            }
        })?;

    let id = UserId::new(user.id);
    tracing::info!("User created successfully! ID: {}, Email: {}, Role: {}", id, email, role);
    Ok(id)
}
