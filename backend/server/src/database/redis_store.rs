//! # Redis
//!
//! RAM database, used only as a key-value table.
//!
//! ## Layout
//!
//! - `overrides:{identity}`: hash, slot -> asset path. Hash fields are unique, so the
//!   one-override-per-slot rule holds without extra locking and HSET is the upsert.
//! - `accounts:next_id`: counter handing out account ids.
//! - `accounts:by_name`: hash, username -> id. HSETNX doubles as the uniqueness check.
//! - `account:{id}`: hash with `username` and `password_hash`.
//! - `session:{id}`: JSON session payload with an expiry.
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};

use super::{Account, AccountId, Store, StoreResult};
use crate::{error::StoreError, images::Slot, session::SessionData};

const NEXT_ACCOUNT_ID: &str = "accounts:next_id";
const ACCOUNTS_BY_NAME: &str = "accounts:by_name";
const FIELD_USERNAME: &str = "username";
const FIELD_PASSWORD_HASH: &str = "password_hash";

pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(100));

        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;

        Ok(Self { connection })
    }

    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

fn overrides_key(identity: &str) -> String {
    format!("overrides:{identity}")
}

fn account_key(id: AccountId) -> String {
    format!("account:{id}")
}

fn session_key(id: &str) -> String {
    format!("session:{id}")
}

#[async_trait]
impl Store for RedisStore {
    async fn get_override(&self, identity: &str, slot: Slot) -> StoreResult<Option<String>> {
        let path: Option<String> = self
            .connection()
            .hget(overrides_key(identity), slot.get())
            .await?;

        Ok(path)
    }

    async fn overrides(&self, identity: &str) -> StoreResult<HashMap<Slot, String>> {
        let raw: HashMap<u8, String> = self.connection().hgetall(overrides_key(identity)).await?;

        Ok(raw
            .into_iter()
            .filter_map(|(slot, path)| Slot::new(slot).map(|slot| (slot, path)))
            .collect())
    }

    async fn put_override(
        &self,
        identity: &str,
        slot: Slot,
        asset_path: &str,
    ) -> StoreResult<Option<String>> {
        let key = overrides_key(identity);

        let (previous,): (Option<String>,) = redis::pipe()
            .atomic()
            .hget(&key, slot.get())
            .hset(&key, slot.get(), asset_path)
            .ignore()
            .query_async(&mut self.connection())
            .await?;

        Ok(previous)
    }

    async fn delete_override(&self, identity: &str, slot: Slot) -> StoreResult<bool> {
        let removed: i64 = self
            .connection()
            .hdel(overrides_key(identity), slot.get())
            .await?;

        Ok(removed > 0)
    }

    async fn create_account(&self, username: &str, password_hash: &str) -> StoreResult<AccountId> {
        let mut connection = self.connection();

        // Burns an id when the name is taken, ids only need to be unique.
        let id: AccountId = connection.incr(NEXT_ACCOUNT_ID, 1).await?;
        let key = account_key(id);

        // The record goes in before the name claim, a name never points at a missing account.
        let _: () = connection
            .hset_multiple(
                &key,
                &[
                    (FIELD_USERNAME, username),
                    (FIELD_PASSWORD_HASH, password_hash),
                ],
            )
            .await?;

        let claimed: bool = connection.hset_nx(ACCOUNTS_BY_NAME, username, id).await?;
        if !claimed {
            let _: () = connection.del(&key).await?;

            return Err(StoreError::Duplicate);
        }

        Ok(id)
    }

    async fn find_account(&self, username: &str) -> StoreResult<Option<Account>> {
        let id: Option<AccountId> = self.connection().hget(ACCOUNTS_BY_NAME, username).await?;

        match id {
            Some(id) => self.account(id).await,
            None => Ok(None),
        }
    }

    async fn account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        let mut fields: HashMap<String, String> =
            self.connection().hgetall(account_key(id)).await?;

        let (Some(username), Some(password_hash)) = (
            fields.remove(FIELD_USERNAME),
            fields.remove(FIELD_PASSWORD_HASH),
        ) else {
            return Ok(None);
        };

        Ok(Some(Account {
            id,
            username,
            password_hash,
        }))
    }

    async fn create_session(
        &self,
        id: &str,
        data: &SessionData,
        ttl: Duration,
    ) -> StoreResult<()> {
        let payload = serde_json::to_string(data)?;

        let _: () = self
            .connection()
            .set_ex(session_key(id), payload, ttl.as_secs().max(1))
            .await?;

        Ok(())
    }

    async fn session(&self, id: &str) -> StoreResult<Option<SessionData>> {
        let payload: Option<String> = self.connection().get(session_key(id)).await?;

        payload
            .map(|payload| serde_json::from_str(&payload))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn delete_session(&self, id: &str) -> StoreResult<()> {
        let _: () = self.connection().del(session_key(id)).await?;

        Ok(())
    }
}
