use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No identity established")]
    IdentityMissing { redirect: &'static str },

    #[error("Username already exists")]
    DuplicateAccount,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Username and password are required")]
    MissingCredentials,

    #[error("Nickname must not be empty")]
    InvalidNickname,

    #[error("Invalid image file")]
    InvalidFile,

    #[error("Image number must be an integer between 0 and 99")]
    MalformedSlotNumber,

    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    fn retry_link(&self) -> Option<&'static str> {
        match self {
            AppError::DuplicateAccount | AppError::MissingCredentials => Some("/register"),
            AppError::InvalidCredentials => Some("/login"),
            AppError::InvalidNickname => Some("/start"),
            AppError::InvalidFile | AppError::MalformedSlotNumber | AppError::MalformedPayload => {
                Some("/upload_override")
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::IdentityMissing { redirect } => return Redirect::to(redirect).into_response(),
            AppError::DuplicateAccount => StatusCode::CONFLICT,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::MissingCredentials
            | AppError::InvalidNickname
            | AppError::InvalidFile
            | AppError::MalformedSlotNumber
            | AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::StorageUnavailable(ref e) => {
                error!("Storage failure: {e}");

                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::InternalError(ref e) => {
                error!("Internal failure: {e}");

                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match self.retry_link() {
            Some(link) => format!("{self}. <a href='{link}'>Try again</a>"),
            None if status.is_server_error() => "Internal server error".to_string(),
            None => self.to_string(),
        };

        (status, Html(body)).into_response()
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate key")]
    Duplicate,

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Invalid {key} value: {reason}")]
    Config { key: String, reason: String },

    #[error("Store initialization failed: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
