//! # Identity
//!
//! Who the caller is, decided once per request before anything else runs.
//!
//! - Account: integer id of a registered user, kept in the server-side session.
//! - Nickname: self-declared, unauthenticated name, kept in the server-side session.
//!   Nothing stops two browsers from picking the same nickname, in which case they share
//!   overrides.
//! - Anonymous: random UUID v4 minted on the first request and kept in a 5 year cookie.
//!
//! The mode is chosen by configuration and fixed for the lifetime of the server.
use std::{fmt, str::FromStr, sync::Arc};

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    database::AccountId,
    error::AppError,
    session::{self, SessionData},
    state::State,
};

pub const ANONYMOUS_COOKIE: &str = "quiz_id";
pub const ANONYMOUS_COOKIE_DAYS: i64 = 5 * 365;

const NICKNAME_FOLDER_HEX_LEN: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identity {
    Account(AccountId),
    Nickname(String),
    Anonymous(Uuid),
}

impl Identity {
    /// Store key, namespaced so the three kinds can never collide.
    pub fn key(&self) -> String {
        match self {
            Identity::Account(id) => format!("account:{id}"),
            Identity::Nickname(nickname) => format!("nickname:{nickname}"),
            Identity::Anonymous(token) => format!("anonymous:{token}"),
        }
    }

    /// Upload subdirectory. Nicknames are hashed so user text never becomes a path segment.
    pub fn folder(&self) -> String {
        match self {
            Identity::Account(id) => id.to_string(),
            Identity::Anonymous(token) => token.to_string(),
            Identity::Nickname(nickname) => {
                let digest = hex::encode(Sha256::digest(nickname.as_bytes()));

                format!("nick-{}", &digest[..NICKNAME_FOLDER_HEX_LEN])
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityMode {
    Account,
    Nickname,
    Anonymous,
}

impl IdentityMode {
    /// Where a caller without an identity is sent.
    pub fn entry_point(self) -> &'static str {
        match self {
            IdentityMode::Account => "/login",
            IdentityMode::Nickname => "/start",
            IdentityMode::Anonymous => "/quiz",
        }
    }
}

impl FromStr for IdentityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "account" => Ok(IdentityMode::Account),
            "nickname" => Ok(IdentityMode::Nickname),
            "anonymous" => Ok(IdentityMode::Anonymous),
            other => Err(format!(
                "unknown identity mode {other:?}, expected account, nickname or anonymous"
            )),
        }
    }
}

impl fmt::Display for IdentityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdentityMode::Account => "account",
            IdentityMode::Nickname => "nickname",
            IdentityMode::Anonymous => "anonymous",
        };

        f.write_str(name)
    }
}

pub fn normalize_nickname(raw: &str) -> Result<String, AppError> {
    let nickname = raw.trim();

    if nickname.is_empty() {
        return Err(AppError::InvalidNickname);
    }

    Ok(nickname.to_string())
}

/// The resolved caller plus any cookie the resolution had to set.
///
/// Handlers must return `cookies` with their response so a freshly minted anonymous id
/// reaches the browser. Error responses drop the jar, so a first request that fails leaves
/// the caller without an id and the next request mints a new one. The id is stable from the
/// first successful response on.
pub struct Caller {
    pub identity: Identity,
    pub cookies: CookieJar,
}

impl FromRequestParts<Arc<State>> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<State>) -> Result<Self, Self::Rejection> {
        resolve(state, &parts.headers).await
    }
}

pub async fn resolve(state: &State, headers: &HeaderMap) -> Result<Caller, AppError> {
    let cookies = CookieJar::from_headers(headers);
    let mode = state.config.identity_mode;

    if mode == IdentityMode::Anonymous {
        return Ok(resolve_anonymous(cookies));
    }

    let jar = session::signed_jar(state, headers);
    let identity = match session::current(state, &jar).await? {
        Some(SessionData::Account { user_id }) if mode == IdentityMode::Account => {
            if state.store.account(user_id).await?.is_none() {
                warn!("Session points at missing account {user_id}, clearing it");

                return Err(AppError::IdentityMissing {
                    redirect: "/logout",
                });
            }

            Identity::Account(user_id)
        }
        Some(SessionData::Nickname { nickname }) if mode == IdentityMode::Nickname => {
            Identity::Nickname(nickname)
        }
        _ => {
            return Err(AppError::IdentityMissing {
                redirect: mode.entry_point(),
            });
        }
    };

    Ok(Caller { identity, cookies })
}

pub fn resolve_anonymous(cookies: CookieJar) -> Caller {
    let existing = cookies
        .get(ANONYMOUS_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok());

    if let Some(token) = existing {
        return Caller {
            identity: Identity::Anonymous(token),
            cookies,
        };
    }

    let token = Uuid::new_v4();
    info!("Minted anonymous identity {token}");

    let cookie = Cookie::build((ANONYMOUS_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(ANONYMOUS_COOKIE_DAYS));

    Caller {
        identity: Identity::Anonymous(token),
        cookies: cookies.add(cookie),
    }
}

pub async fn display_name(state: &State, identity: &Identity) -> Result<String, AppError> {
    Ok(match identity {
        Identity::Account(id) => state
            .store
            .account(*id)
            .await?
            .map(|account| account.username)
            .unwrap_or_default(),
        Identity::Nickname(nickname) => nickname.clone(),
        Identity::Anonymous(_) => "Guest".to_string(),
    })
}
