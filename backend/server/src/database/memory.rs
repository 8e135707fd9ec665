use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};

use super::{Account, AccountId, Store, StoreResult};
use crate::{error::StoreError, images::Slot, session::SessionData};

#[derive(Default)]
struct Accounts {
    next_id: AccountId,
    by_id: HashMap<AccountId, Account>,
    by_name: HashMap<String, AccountId>,
}

#[derive(Default)]
pub struct MemoryStore {
    overrides: RwLock<HashMap<(String, Slot), String>>,
    accounts: RwLock<Accounts>,
    sessions: Mutex<HashMap<String, (SessionData, Instant)>>,
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_override(&self, identity: &str, slot: Slot) -> StoreResult<Option<String>> {
        Ok(self
            .overrides
            .read()
            .get(&(identity.to_string(), slot))
            .cloned())
    }

    async fn overrides(&self, identity: &str) -> StoreResult<HashMap<Slot, String>> {
        Ok(self
            .overrides
            .read()
            .iter()
            .filter(|((owner, _), _)| owner == identity)
            .map(|((_, slot), path)| (*slot, path.clone()))
            .collect())
    }

    async fn put_override(
        &self,
        identity: &str,
        slot: Slot,
        asset_path: &str,
    ) -> StoreResult<Option<String>> {
        Ok(self
            .overrides
            .write()
            .insert((identity.to_string(), slot), asset_path.to_string()))
    }

    async fn delete_override(&self, identity: &str, slot: Slot) -> StoreResult<bool> {
        Ok(self
            .overrides
            .write()
            .remove(&(identity.to_string(), slot))
            .is_some())
    }

    async fn create_account(&self, username: &str, password_hash: &str) -> StoreResult<AccountId> {
        let mut accounts = self.accounts.write();

        if accounts.by_name.contains_key(username) {
            return Err(StoreError::Duplicate);
        }

        accounts.next_id += 1;
        let id = accounts.next_id;

        accounts.by_name.insert(username.to_string(), id);
        accounts.by_id.insert(
            id,
            Account {
                id,
                username: username.to_string(),
                password_hash: password_hash.to_string(),
            },
        );

        Ok(id)
    }

    async fn find_account(&self, username: &str) -> StoreResult<Option<Account>> {
        let accounts = self.accounts.read();

        Ok(accounts
            .by_name
            .get(username)
            .and_then(|id| accounts.by_id.get(id))
            .cloned())
    }

    async fn account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().by_id.get(&id).cloned())
    }

    async fn create_session(
        &self,
        id: &str,
        data: &SessionData,
        ttl: Duration,
    ) -> StoreResult<()> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();

        sessions.retain(|_, (_, expires_at)| *expires_at > now);
        sessions.insert(id.to_string(), (data.clone(), now + ttl));

        Ok(())
    }

    async fn session(&self, id: &str) -> StoreResult<Option<SessionData>> {
        let mut sessions = self.sessions.lock();

        let expired = match sessions.get(id) {
            Some((data, expires_at)) if *expires_at > Instant::now() => {
                return Ok(Some(data.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            sessions.remove(id);
        }

        Ok(None)
    }

    async fn delete_session(&self, id: &str) -> StoreResult<()> {
        self.sessions.lock().remove(id);

        Ok(())
    }
}
