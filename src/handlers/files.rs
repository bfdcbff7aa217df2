// src/handlers/files.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    config::{Config, SIGNED_FILE_TTL_SECONDS},
    error::AppError,
    media::{SharedMedia, check_public_id},
    utils::jwt::{sign_file_token, verify_file_token},
};

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub token: String,
}

/// Returns a short-lived download link for a stored file.
pub async fn signed_link(
    State(config): State<Config>,
    Path(public_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    check_public_id(&public_id)?;

    let token = sign_file_token(&public_id, &config.jwt_secret, SIGNED_FILE_TTL_SECONDS)?;
    let url = format!(
        "{}/api/files/download?token={}",
        config.public_base_url.trim_end_matches('/'),
        token
    );

    Ok(Json(json!({
        "url": url,
        "expires_in": SIGNED_FILE_TTL_SECONDS
    })))
}

/// Streams the file a download token was issued for.
pub async fn download(
    State(config): State<Config>,
    State(media): State<SharedMedia>,
    Query(params): Query<DownloadParams>,
) -> Result<impl IntoResponse, AppError> {
    let public_id = verify_file_token(&params.token, &config.jwt_secret)?;
    let bytes = media.open(&public_id).await?;

    let file_name = public_id.rsplit('/').next().unwrap_or("file").to_string();
    let content_type = content_type_for(&file_name);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    ))
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a1b2-guide.PDF"), "application/pdf");
        assert_eq!(content_type_for("notes.docx"), content_type_for("x.docx"));
        assert_eq!(content_type_for("README"), "application/octet-stream");
    }
}
