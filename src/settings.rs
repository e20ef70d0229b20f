use argon2::PasswordHash;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub debug: bool,
    pub admin_username: String,
    /// Argon2 PHC string, e.g. from the `hash-password` binary.
    pub admin_password_hash: Option<String>,
    pub enable_swagger: bool,
    pub port: u16,
    pub studio_name: String,
    pub studio_location: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // Load from environment variables with APP_ prefix
            .add_source(Environment::with_prefix("APP").try_parsing(true))
            .set_default("database_url", "sqlite://studio.db")?
            .set_default("debug", false)?
            .set_default("admin_username", "admin")?
            .set_default("enable_swagger", true)?
            .set_default("port", 8080)?
            .set_default("studio_name", "Yoga Studio")?
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        if let Some(hash) = &settings.admin_password_hash {
            // an unquoted PHC string in .env loses its `$` segments to variable expansion
            PasswordHash::new(hash).map_err(|err| {
                ConfigError::Message(format!(
                    "APP_ADMIN_PASSWORD_HASH is not a valid argon2 hash ({err}); quote it in .env"
                ))
            })?;
        }
        Ok(settings)
    }
}
