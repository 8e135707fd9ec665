use std::{sync::Arc, time::Duration};

use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use tokio::fs::create_dir_all;
use tracing::warn;

use super::{
    config::{Config, DEFAULT_SECRET_KEY},
    database::{Store, connect_store},
    error::StartupError,
    images::DefaultAssets,
};

pub struct State {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub defaults: DefaultAssets,
    pub cookie_key: Key,
}

impl State {
    pub async fn new(config: Config) -> Result<Arc<Self>, StartupError> {
        let store = connect_store(&config.database_url).await?;

        create_dir_all(config.uploads_dir()).await?;

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn Store>) -> Arc<Self> {
        if config.secret_key == DEFAULT_SECRET_KEY {
            warn!("SECRET_KEY is the development default, sessions can be forged");
        }

        let defaults = DefaultAssets::scan(&config.static_dir);
        let cookie_key = derive_cookie_key(&config.secret_key);

        Arc::new(Self {
            config,
            store,
            defaults,
            cookie_key,
        })
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.config.session_ttl_secs)
    }
}

/// Stretches a secret of any length into the 64 bytes the signing key needs.
fn derive_cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());

    Key::from(digest.as_slice())
}
