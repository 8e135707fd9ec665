//! Password accounts. Hashes are argon2 PHC strings computed on the blocking pool.
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use tokio::task::spawn_blocking;
use tracing::info;

use crate::{
    database::AccountId,
    error::{AppError, StoreError},
    state::State,
};

/// Absent form fields read as empty and fail validation like blank ones.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub async fn register(state: &State, credentials: Credentials) -> Result<AccountId, AppError> {
    let Credentials { username, password } = credentials;

    if username.trim().is_empty() || password.is_empty() {
        return Err(AppError::MissingCredentials);
    }

    let password_hash = blocking(move || hash_password(&password)).await??;

    let id = state
        .store
        .create_account(&username, &password_hash)
        .await
        .map_err(|e| match e {
            StoreError::Duplicate => AppError::DuplicateAccount,
            other => AppError::StorageUnavailable(other),
        })?;

    info!("Registered account {id}");

    Ok(id)
}

/// Unknown users and wrong passwords fail identically.
pub async fn login(state: &State, credentials: Credentials) -> Result<AccountId, AppError> {
    let Credentials { username, password } = credentials;

    let Some(account) = state.store.find_account(&username).await? else {
        return Err(AppError::InvalidCredentials);
    };

    let stored_hash = account.password_hash;
    let verified = blocking(move || verify_password(&password, &stored_hash)).await?;
    if !verified {
        return Err(AppError::InvalidCredentials);
    }

    info!("Account {} logged in", account.id);

    Ok(account.id)
}

async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    spawn_blocking(work)
        .await
        .map_err(|e| AppError::InternalError(format!("Password task failed: {e}")))
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::InternalError(format!("Password hashing failed: {e}")))
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}
