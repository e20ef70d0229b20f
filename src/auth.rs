use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Basic;
use tracing::warn;

use crate::AppState;
use crate::db::StoreError;
use crate::error::ApiError;
use crate::models::Client;
use crate::settings::Settings;

/// Hashes `password` into a PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Hashing(e.to_string()))
}

/// False for a wrong password and for a hash that does not parse.
pub fn verify_password(password: &str, phc_hash: &str) -> bool {
    match PasswordHash::new(phc_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            warn!(error = %err, "stored password hash is malformed");
            false
        }
    }
}

pub fn verify_admin(settings: &Settings, auth: Option<Authorization<Basic>>) -> Result<(), ApiError> {
    let unauthorized = || ApiError::Unauthorized("Invalid administrator credentials".into());

    let Some(hash) = settings.admin_password_hash.as_deref() else {
        warn!("admin request rejected: no admin password hash configured");
        return Err(unauthorized());
    };
    match auth {
        Some(auth)
            if auth.username() == settings.admin_username && verify_password(auth.password(), hash) =>
        {
            Ok(())
        }
        _ => Err(unauthorized()),
    }
}

/// Resolves Basic credentials (phone + password) to a registered client.
pub async fn verify_client(
    state: &AppState,
    auth: Option<Authorization<Basic>>,
) -> Result<Client, ApiError> {
    let auth = auth.ok_or_else(|| ApiError::Unauthorized("Login required".into()))?;
    state
        .clients
        .authenticate(auth.username(), auth.password())
        .await
        .map_err(ApiError::from)
}
