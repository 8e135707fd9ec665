//! # Uploads
//!
//! An upload is validated completely before anything touches disk or the store:
//! slot number first, then presence and extension of the file. Files land in
//! `user_uploads/{identity folder}/{slot}_{sanitized name}` under the static root, then the
//! override row is upserted. A crash between the two leaves an unreferenced file, which is
//! harmless since the row is the source of truth.
use axum::{body::Bytes, extract::Multipart};
use tokio::fs::{create_dir_all, remove_file, write};
use tracing::{info, warn};

use crate::{
    error::{AppError, StoreError},
    identity::Identity,
    images::Slot,
    state::State,
    utils::{allowed_file, secure_filename},
};

pub const UPLOAD_FOLDER: &str = "user_uploads";

pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Default)]
pub struct UploadForm {
    pub image_number: Option<String>,
    pub image: Option<UploadedFile>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| AppError::MalformedPayload)?
        {
            let name = field.name().map(str::to_owned);

            match name.as_deref() {
                Some("image_number") => {
                    let text = field.text().await.map_err(|_| AppError::MalformedPayload)?;
                    form.image_number = Some(text);
                }
                Some("image") => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(|_| AppError::MalformedPayload)?;
                    form.image = Some(UploadedFile { filename, bytes });
                }
                _ => {}
            }
        }

        Ok(form)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct StoredUpload {
    pub slot: Slot,
    pub relative_path: String,
}

pub async fn upload(
    state: &State,
    identity: &Identity,
    form: UploadForm,
) -> Result<StoredUpload, AppError> {
    let slot: Slot = form
        .image_number
        .as_deref()
        .ok_or(AppError::MalformedSlotNumber)?
        .parse()?;

    let file = form
        .image
        .filter(|file| allowed_file(&file.filename))
        .ok_or(AppError::InvalidFile)?;

    let filename = secure_filename(&file.filename);
    if filename.is_empty() {
        return Err(AppError::InvalidFile);
    }

    let folder = identity.folder();
    let user_dir = state.config.uploads_dir().join(&folder);
    create_dir_all(&user_dir).await.map_err(StoreError::from)?;

    let stored_name = format!("{slot}_{filename}");
    write(user_dir.join(&stored_name), &file.bytes)
        .await
        .map_err(StoreError::from)?;

    let relative_path = format!("{UPLOAD_FOLDER}/{folder}/{stored_name}");
    let previous = state
        .store
        .put_override(&identity.key(), slot, &relative_path)
        .await?;

    info!("Stored override for slot {slot} at {relative_path}");

    if state.config.prune_replaced_uploads {
        if let Some(previous) = previous.filter(|previous| *previous != relative_path) {
            prune(state, &previous).await;
        }
    }

    Ok(StoredUpload {
        slot,
        relative_path,
    })
}

/// Best-effort removal of a superseded upload. Never touches files outside the upload tree.
async fn prune(state: &State, relative_path: &str) {
    let inside_uploads = relative_path.starts_with(&format!("{UPLOAD_FOLDER}/"))
        && !relative_path.split('/').any(|part| part == "..");
    if !inside_uploads {
        warn!("Refusing to prune {relative_path}, not an upload");
        return;
    }

    if let Err(e) = remove_file(state.config.static_dir.join(relative_path)).await {
        warn!("Failed to prune replaced upload {relative_path}: {e}");
    }
}
