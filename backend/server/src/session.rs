//! Server-side sessions.
//!
//! The browser only holds a signed session id; the payload lives in the store and expires
//! with it. Starting a session always rotates the id.
use axum::http::HeaderMap;
use axum_extra::extract::{
    SignedCookieJar,
    cookie::{Cookie, SameSite},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{database::AccountId, error::AppError, state::State};

pub const SESSION_COOKIE: &str = "session";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionData {
    Account { user_id: AccountId },
    Nickname { nickname: String },
}

pub fn signed_jar(state: &State, headers: &HeaderMap) -> SignedCookieJar {
    SignedCookieJar::from_headers(headers, state.cookie_key.clone())
}

pub async fn current(state: &State, jar: &SignedCookieJar) -> Result<Option<SessionData>, AppError> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };

    Ok(state.store.session(cookie.value()).await?)
}

pub async fn start(
    state: &State,
    jar: SignedCookieJar,
    data: SessionData,
) -> Result<SignedCookieJar, AppError> {
    if let Some(previous) = jar.get(SESSION_COOKIE) {
        state.store.delete_session(previous.value()).await?;
    }

    let id = Uuid::new_v4().to_string();
    let ttl = state.session_ttl();
    state.store.create_session(&id, &data, ttl).await?;

    let max_age = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    let cookie = Cookie::build((SESSION_COOKIE, id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age));

    Ok(jar.add(cookie))
}

pub async fn end(state: &State, jar: SignedCookieJar) -> Result<SignedCookieJar, AppError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.store.delete_session(cookie.value()).await?;
    }

    Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")))
}
