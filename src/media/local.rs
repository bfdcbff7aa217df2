// src/media/local.rs

use std::path::PathBuf;

use async_trait::async_trait;
use axum::body::Bytes;
use uuid::Uuid;

use super::{MediaError, MediaStore, StoredMedia, UploadedFile, check_public_id, sanitize_file_name};

/// Media store backed by a local directory, served under `/uploads`.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: format!("{}/uploads", public_base_url.trim_end_matches('/')),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn path_of(&self, public_id: &str) -> Result<PathBuf, MediaError> {
        check_public_id(public_id)?;
        Ok(self.root.join(public_id))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, folder: &str, file: &UploadedFile) -> Result<StoredMedia, MediaError> {
        let (stem, ext) = sanitize_file_name(&file.file_name);
        let unique = &Uuid::new_v4().simple().to_string()[..8];
        let name = match ext {
            Some(ext) => format!("{}-{}.{}", unique, stem, ext),
            None => format!("{}-{}", unique, stem),
        };
        let public_id = format!("{}/{}", folder, name);
        let path = self.path_of(&public_id)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &file.bytes).await?;

        tracing::debug!(public_id = %public_id, size = file.bytes.len(), "Stored upload");

        Ok(StoredMedia {
            url: format!("{}/{}", self.base_url, public_id),
            public_id,
        })
    }

    async fn open(&self, public_id: &str) -> Result<Bytes, MediaError> {
        let path = self.path_of(public_id)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MediaError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, public_id: &str) -> Result<(), MediaError> {
        let path = self.path_of(public_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
