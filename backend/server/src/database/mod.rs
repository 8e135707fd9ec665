//! # Store
//!
//! Every piece of durable state lives behind [`Store`]:
//!
//! - Overrides: (identity, slot) -> asset path, at most one per pair. Writes are upserts,
//!   so concurrent uploads to the same pair resolve as last writer wins.
//! - Accounts: id, unique username, password hash. Never deleted.
//! - Sessions: opaque session id -> [`SessionData`], expiring after a TTL.
//!
//! ## Backends
//!
//! - `redis://...` uses [`RedisStore`]: one hash per identity for overrides, a counter plus
//!   a username index for accounts, plain expiring keys for sessions.
//! - `memory` uses [`MemoryStore`]: same semantics, process lifetime only. Handy for tests
//!   and local runs without Redis.
use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::info;

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::{error::StoreError, images::Slot, session::SessionData};

pub const MEMORY_URL: &str = "memory";

pub type AccountId = i64;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub password_hash: String,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_override(&self, identity: &str, slot: Slot) -> StoreResult<Option<String>>;

    /// All overrides of one identity, used to render the whole grid with a single lookup.
    async fn overrides(&self, identity: &str) -> StoreResult<HashMap<Slot, String>>;

    /// Upserts the override and returns the path it replaced, if any.
    async fn put_override(
        &self,
        identity: &str,
        slot: Slot,
        asset_path: &str,
    ) -> StoreResult<Option<String>>;

    /// Returns whether an entry was removed.
    async fn delete_override(&self, identity: &str, slot: Slot) -> StoreResult<bool>;

    /// Fails with [`StoreError::Duplicate`] when the username is taken.
    async fn create_account(&self, username: &str, password_hash: &str) -> StoreResult<AccountId>;

    async fn find_account(&self, username: &str) -> StoreResult<Option<Account>>;

    async fn account(&self, id: AccountId) -> StoreResult<Option<Account>>;

    async fn create_session(&self, id: &str, data: &SessionData, ttl: Duration)
    -> StoreResult<()>;

    async fn session(&self, id: &str) -> StoreResult<Option<SessionData>>;

    async fn delete_session(&self, id: &str) -> StoreResult<()>;
}

pub async fn connect_store(database_url: &str) -> StoreResult<Arc<dyn Store>> {
    if database_url == MEMORY_URL {
        info!("Using in-memory store, nothing will survive a restart");

        return Ok(Arc::new(MemoryStore::default()));
    }

    info!("Connecting to Redis...");
    let store = RedisStore::connect(database_url).await?;

    Ok(Arc::new(store))
}
