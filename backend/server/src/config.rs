use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use tracing::{info, warn};

use crate::{error::StartupError, identity::IdentityMode};

pub const DEFAULT_SECRET_KEY: &str = "default_dev_secret";

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub secret_key: String,
    pub database_url: String,
    pub static_dir: PathBuf,
    pub identity_mode: IdentityMode,
    pub session_ttl_secs: u64,
    pub max_upload_bytes: usize,
    pub prune_replaced_uploads: bool,
}

impl Config {
    pub fn load() -> Result<Self, StartupError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests never touch the process environment.
    pub fn from_source<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            port: try_load(&lookup, "RUST_PORT", "5000")?,
            secret_key: read_secret(&lookup, "SECRET_KEY"),
            database_url: try_load(&lookup, "DATABASE_URL", "redis://127.0.0.1:6379")?,
            static_dir: try_load(&lookup, "STATIC_DIR", "static")?,
            identity_mode: try_load(&lookup, "IDENTITY_MODE", "account")?,
            session_ttl_secs: try_load(&lookup, "SESSION_TTL_SECS", "2592000")?,
            max_upload_bytes: try_load(&lookup, "MAX_UPLOAD_BYTES", "10485760")?,
            prune_replaced_uploads: try_load(&lookup, "PRUNE_REPLACED_UPLOADS", "false")?,
        })
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.static_dir.join(crate::upload::UPLOAD_FOLDER)
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, StartupError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");

            StartupError::Config {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })
}

fn read_secret<F>(lookup: &F, secret_name: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup(secret_name).filter(|s| !s.trim().is_empty()) {
        return secret;
    }

    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|e| {
            warn!("Failed to read {secret_name} from env or file ({e}), using an insecure default");

            DEFAULT_SECRET_KEY.to_string()
        })
}
