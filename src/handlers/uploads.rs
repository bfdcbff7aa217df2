// src/handlers/uploads.rs

use axum::{
    Extension, Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    config::MAX_PROFILE_IMAGE_BYTES,
    error::AppError,
    media::SharedMedia,
    utils::{
        jwt::Claims,
        multipart::{MultipartForm, ensure_file},
    },
};

const IMAGE_FIELD: &str = "image";
const PROFILE_FOLDER: &str = "profiles";

/// Stores a profile picture and returns its URL.
///
/// The URL is not attached to the account here; clients save it through
/// the profile update endpoint.
pub async fn upload_profile_image(
    State(media): State<SharedMedia>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = MultipartForm::read(multipart).await?;

    let mut images = form.take_files(IMAGE_FIELD);
    form.reject_unexpected_files()?;
    if images.len() > 1 {
        return Err(AppError::BadRequest("Only one image is allowed".to_string()));
    }
    let image = images
        .pop()
        .ok_or(AppError::BadRequest("Field 'image' is required".to_string()))?;
    ensure_file(&image, IMAGE_FIELD, &["image/*"], MAX_PROFILE_IMAGE_BYTES)?;

    let stored = media.upload(PROFILE_FOLDER, &image).await.map_err(|e| {
        tracing::error!("Failed to store profile image: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!("Profile image {} uploaded by {}", stored.public_id, claims.email);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "image_url": stored.url,
            "public_id": stored.public_id
        })),
    ))
}
