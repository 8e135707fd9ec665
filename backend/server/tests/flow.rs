use std::{fs, sync::Arc};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Request, Response, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
};
use server::{
    build_router, config::Config, database::MemoryStore, identity::ANONYMOUS_COOKIE,
    session::SESSION_COOKIE, state::State,
};
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "quizboundary";

fn app(mode: &str) -> (Router, TempDir) {
    let root = TempDir::new().unwrap();
    let images = root.path().join("images");
    fs::create_dir_all(&images).unwrap();
    fs::write(images.join("3.jpg"), b"jpg").unwrap();
    fs::write(images.join("4.png"), b"png").unwrap();

    let static_dir = root.path().display().to_string();
    let mode = mode.to_string();
    let config = Config::from_source(move |key| match key {
        "STATIC_DIR" => Some(static_dir.clone()),
        "DATABASE_URL" => Some("memory".to_string()),
        "SECRET_KEY" => Some("integration-secret".to_string()),
        "IDENTITY_MODE" => Some(mode.clone()),
        _ => None,
    })
    .unwrap();

    let state = State::with_store(config, Arc::new(MemoryStore::default()));

    (build_router(state), root)
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    String::from_utf8(bytes.to_vec()).unwrap()
}

fn get(uri: &str, cookies: &str) -> Request<Body> {
    let mut builder = Request::get(uri);
    if !cookies.is_empty() {
        builder = builder.header(COOKIE, cookies);
    }

    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, body: &str, cookies: &str) -> Request<Body> {
    let mut builder = Request::post(uri).header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if !cookies.is_empty() {
        builder = builder.header(COOKIE, cookies);
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

fn post_upload(image_number: &str, filename: &str, bytes: &[u8], cookies: &str) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image_number\"\r\n\r\n{image_number}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::post("/upload_override").header(
        CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if !cookies.is_empty() {
        builder = builder.header(COOKIE, cookies);
    }

    builder.body(Body::from(body)).unwrap()
}

/// `name=value` of the first Set-Cookie for `name`.
fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{name}=")))
        .map(|value| value.split(';').next().unwrap_or_default().to_string())
}

fn location(response: &Response<Body>) -> &str {
    response.headers()[LOCATION].to_str().unwrap()
}

#[tokio::test]
async fn test_account_flow() {
    let (app, root) = app("account");

    let response = send(&app, get("/quiz", "")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = send(&app, post_form("/register", "username=alice&password=secret123", "")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = send(&app, post_form("/register", "username=alice&password=other", "")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(body_text(response).await.contains("Username already exists"));

    let wrong_password = send(&app, post_form("/login", "username=alice&password=wrong", "")).await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    let unknown_user = send(&app, post_form("/login", "username=mallory&password=secret123", "")).await;
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(wrong_password).await, body_text(unknown_user).await);

    let response = send(&app, post_form("/login", "username=alice&password=secret123", "")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/quiz");
    let session = set_cookie(&response, SESSION_COOKIE).expect("session cookie");

    let response = send(&app, get("/", &session)).await;
    assert_eq!(location(&response), "/quiz");

    let response = send(&app, post_upload("7", "photo.png", b"fake png", &session)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/upload_override");
    let uploaded = set_cookie(&response, "uploaded").expect("flash cookie");
    assert_eq!(uploaded, "uploaded=7");

    let response = send(&app, get("/upload_override", &format!("{session}; {uploaded}"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Image for 7 uploaded."));

    let response = send(&app, get("/quiz", &session)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("alice"));
    assert!(page.contains("src=\"/static/user_uploads/1/7_photo.png\""));
    assert!(page.contains("src=\"/static/images/3.jpg\""));
    assert!(page.contains("src=\"/static/images/4.png\""));
    assert_eq!(page.matches("/static/images/placeholder.png").count(), 97);

    assert_eq!(
        fs::read(root.path().join("user_uploads/1/7_photo.png")).unwrap(),
        b"fake png"
    );
    let response = send(&app, get("/static/user_uploads/1/7_photo.png", "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "fake png");

    let response = send(&app, get("/course", &session)).await;
    assert!(body_text(response).await.contains("alice"));

    let response = send(&app, get("/logout", &session)).await;
    assert_eq!(location(&response), "/login");

    let response = send(&app, get("/quiz", &session)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_account_upload_rejections() {
    let (app, root) = app("account");

    send(&app, post_form("/register", "username=bob&password=pw", "")).await;
    let response = send(&app, post_form("/login", "username=bob&password=pw", "")).await;
    let session = set_cookie(&response, SESSION_COOKIE).unwrap();

    let response = send(&app, post_upload("seven", "photo.png", b"x", &session)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, post_upload("100", "photo.png", b"x", &session)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, post_upload("5", "notes.txt", b"x", &session)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Invalid image file"));

    assert!(!root.path().join("user_uploads/1").exists());

    let response = send(&app, get("/quiz", &session)).await;
    let page = body_text(response).await;
    assert!(!page.contains("user_uploads"));
}

#[tokio::test]
async fn test_admin_delete() {
    let (app, _root) = app("account");

    send(&app, post_form("/register", "username=carol&password=pw", "")).await;
    let response = send(&app, post_form("/login", "username=carol&password=pw", "")).await;
    let session = set_cookie(&response, SESSION_COOKIE).unwrap();

    let response = send(&app, get("/admin/delete_db_entry/12", &session)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("No override found"));

    send(&app, post_upload("12", "cat.gif", b"gif", &session)).await;

    let response = send(&app, get("/admin/delete_db_entry/12", &session)).await;
    assert!(body_text(response).await.contains("Deleted override"));

    let response = send(&app, get("/admin/delete_db_entry/abc", &session)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, get("/admin/delete_db_entry/12", "")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_anonymous_identity() {
    let (app, _root) = app("anonymous");

    let response = send(&app, get("/", "")).await;
    assert_eq!(location(&response), "/quiz");

    let response = send(&app, get("/quiz", "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let minted = set_cookie(&response, ANONYMOUS_COOKIE).expect("anonymous cookie");
    let raw = response
        .headers()
        .get(SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(raw.contains("Max-Age=157680000"));
    assert!(minted.len() > ANONYMOUS_COOKIE.len() + 1);

    let response = send(&app, get("/quiz", &minted)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response, ANONYMOUS_COOKIE).is_none());

    let token = minted.trim_start_matches(&format!("{ANONYMOUS_COOKIE}="));
    send(&app, post_upload("0", "me.jpeg", b"jpeg", &minted)).await;

    let page = body_text(send(&app, get("/quiz", &minted)).await).await;
    assert!(page.contains(&format!("/static/user_uploads/{token}/0_me.jpeg")));

    let stranger = body_text(send(&app, get("/quiz", "")).await).await;
    assert!(!stranger.contains("user_uploads"));

    let response = send(&app, get("/login", "")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_nickname_identity() {
    let (app, _root) = app("nickname");

    let response = send(&app, get("/quiz", "")).await;
    assert_eq!(location(&response), "/start");

    let response = send(&app, post_form("/start", "nickname=+++", "")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, post_form("/start", "nickname=++bob+", "")).await;
    assert_eq!(location(&response), "/quiz");
    let session = set_cookie(&response, SESSION_COOKIE).unwrap();

    let page = body_text(send(&app, get("/quiz", &session)).await).await;
    assert!(page.contains("Welcome, bob"));

    let response = send(&app, get("/register", "")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, get("/logout", &session)).await;
    assert_eq!(location(&response), "/start");
}

#[tokio::test]
async fn test_reload_defaults() {
    let (app, root) = app("anonymous");

    let response = send(&app, get("/quiz", "")).await;
    let minted = set_cookie(&response, ANONYMOUS_COOKIE).unwrap();
    assert!(!body_text(response).await.contains("/static/images/9.png"));

    fs::write(root.path().join("images/9.png"), b"png").unwrap();

    let reload = Request::post("/admin/reload_defaults")
        .header(COOKIE, &minted)
        .body(Body::empty())
        .unwrap();
    let response = send(&app, reload).await;
    assert!(body_text(response).await.contains("Indexed 3 default images."));

    let page = body_text(send(&app, get("/quiz", &minted)).await).await;
    assert!(page.contains("/static/images/9.png"));
}

#[tokio::test]
async fn test_missing_credential_fields() {
    let (app, _root) = app("account");

    let response = send(&app, post_form("/register", "username=alice", "")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("<a href='/register'>Try again</a>"));

    let response = send(&app, post_form("/register", "", "")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    send(&app, post_form("/register", "username=alice&password=pw", "")).await;

    let response = send(&app, post_form("/login", "username=alice", "")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(response).await.contains("<a href='/login'>Try again</a>"));
}

#[tokio::test]
async fn test_missing_nickname_field() {
    let (app, _root) = app("nickname");

    let response = send(&app, post_form("/start", "", "")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("<a href='/start'>Try again</a>"));
}

#[tokio::test]
async fn test_upload_flash_is_one_shot() {
    let (app, _root) = app("anonymous");

    let response = send(&app, get("/quiz", "")).await;
    let minted = set_cookie(&response, ANONYMOUS_COOKIE).unwrap();

    let response = send(&app, post_upload("5", "notes.txt", b"x", &minted)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookie(&response, "uploaded").is_none());
    assert!(
        body_text(response)
            .await
            .contains("Invalid image file. <a href='/upload_override'>Try again</a>")
    );

    let response = send(&app, post_upload("5", "ok.png", b"png", &minted)).await;
    let uploaded = set_cookie(&response, "uploaded").unwrap();
    let cookies = format!("{minted}; {uploaded}");

    let response = send(&app, get("/upload_override", &cookies)).await;
    assert_eq!(set_cookie(&response, "uploaded").as_deref(), Some("uploaded="));
    assert!(body_text(response).await.contains("Image for 5 uploaded."));

    let response = send(&app, get("/upload_override", &minted)).await;
    assert!(!body_text(response).await.contains("uploaded."));
}

#[tokio::test]
async fn test_anonymous_id_survives_only_successful_responses() {
    let (app, _root) = app("anonymous");

    let response = send(&app, get("/admin/delete_db_entry/abc", "")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookie(&response, ANONYMOUS_COOKIE).is_none());

    let response = send(&app, get("/course", "")).await;
    let minted = set_cookie(&response, ANONYMOUS_COOKIE).unwrap();

    let response = send(&app, get("/admin/delete_db_entry/abc", &minted)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, get("/admin/delete_db_entry/3", &minted)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response, ANONYMOUS_COOKIE).is_none());
}
