//! Image quiz server.
//!
//! Callers establish an identity, then browse a grid of 100 numbered images and may replace
//! any of them with their own upload.
//!
//!
//!
//! # Identity
//!
//! Exactly one identity is active per request, picked by `IDENTITY_MODE`:
//! - `account`: register/login with a password, id kept in a server-side session
//! - `nickname`: any non-blank nickname, kept in a server-side session, not unique
//! - `anonymous`: UUID v4 minted on the first visit, stored in a 5 year cookie
//!
//! Sessions are a signed cookie holding a random session id, the payload sits in the store.
//!
//!
//!
//! # Image Resolution
//!
//! Per slot, first match wins: the caller's override, `images/{n}.jpg`, `images/{n}.png`,
//! `images/placeholder.png`. Default images are indexed once at startup, so rendering the
//! grid costs one store lookup and no filesystem probes. `POST /admin/reload_defaults`
//! re-indexes after new defaults are dropped in.
//!
//!
//!
//! # Uploads
//!
//! `POST /upload_override` with `image_number` (0-99) and a png/jpg/jpeg/gif `image`.
//! Files go to `user_uploads/{identity}/{n}_{name}` under the static root. Uploading to the
//! same slot again replaces the override; the old file stays on disk unless
//! `PRUNE_REPLACED_UPLOADS=true`.
//!
//!
//!
//! # Routes
//!
//! | Route | Modes |
//! |---|---|
//! | `GET /` | all, redirects to the quiz or the identity step |
//! | `GET,POST /register`, `GET,POST /login` | account |
//! | `GET,POST /start` | nickname |
//! | `GET /logout` | account, nickname |
//! | `GET /quiz`, `GET /course` | all |
//! | `GET,POST /upload_override` | all |
//! | `GET /admin/delete_db_entry/{n}` | all, only touches the caller's own override |
//! | `POST /admin/reload_defaults` | all |
//! | `GET /static/*` | all |
//!
//!
//!
//! # Setup
//!
//! Run against Redis.
//! ```sh
//! SECRET_KEY=change-me DATABASE_URL=redis://127.0.0.1:6379 cargo run -p quiz
//! ```
//!
//! Run without Redis, state is lost on exit.
//! ```sh
//! DATABASE_URL=memory IDENTITY_MODE=anonymous RUST_LOG=info cargo run -p quiz
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod accounts;
pub mod config;
pub mod database;
pub mod error;
pub mod identity;
pub mod images;
pub mod routes;
pub mod session;
pub mod state;
pub mod upload;
pub mod utils;
pub mod views;

use config::Config;
use error::StartupError;
use identity::IdentityMode;
use images::STATIC_URL;
use routes::{
    course_handler, delete_handler, home_handler, login_form_handler, login_handler,
    logout_handler, quiz_handler, register_form_handler, register_handler,
    reload_defaults_handler, start_form_handler, start_handler, upload_form_handler,
    upload_handler,
};
use state::State;

pub async fn start_server() -> Result<(), StartupError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = State::new(config).await?;

    info!("Starting server...");
    let app = build_router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!(
        "Binding to {address} with {} identities",
        state.config.identity_mode
    );

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

pub fn build_router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let router: Router<Arc<State>> = Router::new()
        .route("/", get(home_handler))
        .route("/quiz", get(quiz_handler))
        .route("/course", get(course_handler))
        .route(
            "/upload_override",
            get(upload_form_handler).post(upload_handler),
        )
        .route(
            "/admin/delete_db_entry/{image_number}",
            get(delete_handler),
        )
        .route("/admin/reload_defaults", post(reload_defaults_handler));

    let router = match state.config.identity_mode {
        IdentityMode::Account => router
            .route(
                "/register",
                get(register_form_handler).post(register_handler),
            )
            .route("/login", get(login_form_handler).post(login_handler))
            .route("/logout", get(logout_handler)),
        IdentityMode::Nickname => router
            .route("/start", get(start_form_handler).post(start_handler))
            .route("/logout", get(logout_handler)),
        IdentityMode::Anonymous => router,
    };

    router
        .nest_service(STATIC_URL, ServeDir::new(&state.config.static_dir))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
