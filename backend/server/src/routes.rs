use std::sync::Arc;

use axum::{
    Form, extract,
    extract::{Multipart, Path},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect},
};
use axum_extra::extract::cookie::Cookie;
use serde::Deserialize;
use tracing::info;

use crate::{
    accounts::{self, Credentials},
    error::AppError,
    identity::{self, Caller, IdentityMode},
    images::{Slot, quiz_grid},
    session::{self, SessionData},
    state::State,
    upload::{UploadForm, upload},
    views,
};

/// One-shot cookie carrying the slot of the last successful upload.
pub const UPLOADED_COOKIE: &str = "uploaded";

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct NicknameForm {
    nickname: String,
}

pub async fn home_handler(
    extract::State(state): extract::State<Arc<State>>,
    headers: HeaderMap,
) -> Result<Redirect, AppError> {
    if state.config.identity_mode == IdentityMode::Anonymous {
        return Ok(Redirect::to("/quiz"));
    }

    match identity::resolve(&state, &headers).await {
        Ok(_) => Ok(Redirect::to("/quiz")),
        Err(AppError::IdentityMissing { redirect }) => Ok(Redirect::to(redirect)),
        Err(e) => Err(e),
    }
}

pub async fn register_form_handler() -> impl IntoResponse {
    views::register_page()
}

pub async fn register_handler(
    extract::State(state): extract::State<Arc<State>>,
    Form(credentials): Form<Credentials>,
) -> Result<Redirect, AppError> {
    accounts::register(&state, credentials).await?;

    Ok(Redirect::to("/login"))
}

pub async fn login_form_handler() -> impl IntoResponse {
    views::login_page()
}

pub async fn login_handler(
    extract::State(state): extract::State<Arc<State>>,
    headers: HeaderMap,
    Form(credentials): Form<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = accounts::login(&state, credentials).await?;

    let jar = session::signed_jar(&state, &headers);
    let jar = session::start(&state, jar, SessionData::Account { user_id }).await?;

    Ok((jar, Redirect::to("/quiz")))
}

pub async fn start_form_handler() -> impl IntoResponse {
    views::start_page()
}

pub async fn start_handler(
    extract::State(state): extract::State<Arc<State>>,
    headers: HeaderMap,
    Form(form): Form<NicknameForm>,
) -> Result<impl IntoResponse, AppError> {
    let nickname = identity::normalize_nickname(&form.nickname)?;

    let jar = session::signed_jar(&state, &headers);
    let jar = session::start(&state, jar, SessionData::Nickname { nickname }).await?;

    Ok((jar, Redirect::to("/quiz")))
}

pub async fn logout_handler(
    extract::State(state): extract::State<Arc<State>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let jar = session::signed_jar(&state, &headers);
    let jar = session::end(&state, jar).await?;

    Ok((jar, Redirect::to(state.config.identity_mode.entry_point())))
}

pub async fn quiz_handler(
    extract::State(state): extract::State<Arc<State>>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let grid = quiz_grid(state.store.as_ref(), &state.defaults, &caller.identity).await?;
    let display_name = identity::display_name(&state, &caller.identity).await?;

    Ok((caller.cookies, views::quiz_page(&display_name, &grid)))
}

pub async fn upload_form_handler(caller: Caller) -> impl IntoResponse {
    let uploaded = caller
        .cookies
        .get(UPLOADED_COOKIE)
        .and_then(|cookie| cookie.value().parse::<Slot>().ok());

    let flash = uploaded.map(|slot| format!("Image for {slot} uploaded."));
    let cookies = caller
        .cookies
        .remove(Cookie::build(UPLOADED_COOKIE).path("/"));

    (cookies, views::upload_page(flash.as_deref()))
}

pub async fn upload_handler(
    extract::State(state): extract::State<Arc<State>>,
    caller: Caller,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = UploadForm::read(multipart).await?;
    let stored = upload(&state, &caller.identity, form).await?;

    let flash = Cookie::build((UPLOADED_COOKIE, stored.slot.to_string())).path("/");

    Ok((caller.cookies.add(flash), Redirect::to("/upload_override")))
}

pub async fn delete_handler(
    extract::State(state): extract::State<Arc<State>>,
    caller: Caller,
    Path(image_number): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let slot: Slot = image_number.parse()?;

    let removed = state
        .store
        .delete_override(&caller.identity.key(), slot)
        .await?;

    let message = if removed {
        info!("Deleted override for slot {slot}");
        format!("Deleted override for image {slot}.")
    } else {
        format!("No override found for image {slot}.")
    };

    Ok((caller.cookies, Html(message)))
}

pub async fn reload_defaults_handler(
    extract::State(state): extract::State<Arc<State>>,
    caller: Caller,
) -> impl IntoResponse {
    let found = state.defaults.reload();

    (caller.cookies, Html(format!("Indexed {found} default images.")))
}

pub async fn course_handler(
    extract::State(state): extract::State<Arc<State>>,
    caller: Caller,
) -> Result<impl IntoResponse, AppError> {
    let display_name = identity::display_name(&state, &caller.identity).await?;

    Ok((caller.cookies, views::course_page(&display_name)))
}
