// src/media/mod.rs

//! Media store collaborator: binary uploads in, public URL + opaque id out.

pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found")]
    NotFound,

    #[error("Invalid file id: {0}")]
    InvalidId(String),
}

/// A file received from a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Where an upload ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub url: String,
    /// Handle for later `open` / `delete` calls.
    pub public_id: String,
}

pub type SharedMedia = Arc<dyn MediaStore>;

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, folder: &str, file: &UploadedFile) -> Result<StoredMedia, MediaError>;
    async fn open(&self, public_id: &str) -> Result<Bytes, MediaError>;
    /// Deleting a missing file is not an error.
    async fn delete(&self, public_id: &str) -> Result<(), MediaError>;
}

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("static regex"));

static PUBLIC_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+(/[A-Za-z0-9_-]+(\.[A-Za-z0-9]+)?)+$").expect("static regex")
});

/// Reduces an uploaded file name to a safe `(stem, extension)` pair.
pub fn sanitize_file_name(file_name: &str) -> (String, Option<String>) {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (base, None),
    };

    let stem = UNSAFE_CHARS.replace_all(stem, "_");
    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { "file" } else { stem };
    let stem: String = stem.chars().take(80).collect();

    let ext = ext
        .map(|e| UNSAFE_CHARS.replace_all(e, "").to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 10);

    (stem, ext)
}

/// Rejects ids that could escape the media root.
pub fn check_public_id(public_id: &str) -> Result<(), MediaError> {
    if PUBLIC_ID.is_match(public_id) {
        Ok(())
    } else {
        Err(MediaError::InvalidId(public_id.to_string()))
    }
}
