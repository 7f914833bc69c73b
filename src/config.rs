use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use log::{info, warn};
use thiserror::Error;

use crate::cryptography::generate_secret_key;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid {key} value: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub secret_key: String,
    pub token_lifetime: Duration,
    pub media_root: PathBuf,
    pub max_upload_bytes: u64,
}

impl Config {
    /// Reads the environment, after merging in a `.env` file when present.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }

        let token_lifetime = token_lifetime(try_load("TOKEN_LIFETIME_HOURS", "24")?)?;

        Ok(Self {
            bind_address: try_load("BIND_ADDRESS", "0.0.0.0:8000")?,
            database_url: try_load("DATABASE_URL", "sqlite://recipe_app.db")?,
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            secret_key: load_secret_key(),
            token_lifetime,
            media_root: try_load("MEDIA_ROOT", "media")?,
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", "10485760")?,
        })
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        })
}

fn token_lifetime(hours: u64) -> Result<Duration, ConfigError> {
    hours
        .checked_mul(60 * 60)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            key: "TOKEN_LIFETIME_HOURS",
            message: format!("{hours} hours is out of range"),
        })
}

fn load_secret_key() -> String {
    match env::var("SECRET_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            warn!("SECRET_KEY not set, tokens will not survive a restart");
            generate_secret_key()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_values_name_the_variable() {
        env::set_var("RECIPE_APP_TEST_PORT", "not-a-port");
        let error = try_load::<u16>("RECIPE_APP_TEST_PORT", "8000").unwrap_err();
        assert!(error.to_string().contains("RECIPE_APP_TEST_PORT"));
    }

    #[test]
    fn token_lifetime_rejects_overflow() {
        assert_eq!(token_lifetime(24).unwrap(), Duration::from_secs(86_400));
        let error = token_lifetime(u64::MAX).unwrap_err();
        assert!(error.to_string().contains("TOKEN_LIFETIME_HOURS"));
    }

    #[test]
    fn defaults_apply_when_unset() {
        let value: u16 = try_load("RECIPE_APP_TEST_UNSET", "8000").unwrap();
        assert_eq!(value, 8000);
    }
}
