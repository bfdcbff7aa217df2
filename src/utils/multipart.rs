// src/utils/multipart.rs

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::{error::AppError, media::UploadedFile};

/// A fully buffered multipart body: text fields by name, files in arrival order.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: Vec<(String, UploadedFile)>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field.bytes().await?;
                    form.files.push((
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            bytes,
                        },
                    ));
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_file(mut self, name: &str, file: UploadedFile) -> Self {
        self.files.push((name.to_string(), file));
        self
    }

    /// Trimmed text value; empty strings count as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require_text(&self, name: &str) -> Result<&str, AppError> {
        self.text(name)
            .ok_or_else(|| AppError::BadRequest(format!("Field '{}' is required", name)))
    }

    /// Removes and returns every file sent under `name`.
    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        let (taken, rest): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.files).into_iter().partition(|(n, _)| n == name);
        self.files = rest;
        taken.into_iter().map(|(_, f)| f).collect()
    }

    /// Fails if files remain that no caller asked for.
    pub fn reject_unexpected_files(&self) -> Result<(), AppError> {
        match self.files.first() {
            Some((name, _)) => Err(AppError::BadRequest(format!(
                "Unexpected file field '{}'",
                name
            ))),
            None => Ok(()),
        }
    }
}

/// Checks a file's declared MIME type and size.
///
/// `allowed` entries may end in `/*` to accept a whole family.
pub fn ensure_file(
    file: &UploadedFile,
    field: &str,
    allowed: &[&str],
    max_bytes: usize,
) -> Result<(), AppError> {
    let mime = file.content_type.to_ascii_lowercase();
    let accepted = allowed.iter().any(|pattern| match pattern.strip_suffix("/*") {
        Some(family) => mime
            .split_once('/')
            .is_some_and(|(prefix, _)| prefix == family),
        None => mime == *pattern,
    });

    if !accepted {
        return Err(AppError::BadRequest(format!(
            "File type '{}' is not allowed for '{}'",
            file.content_type, field
        )));
    }

    if file.bytes.len() > max_bytes {
        return Err(AppError::BadRequest(format!(
            "File '{}' exceeds {} bytes",
            file.file_name, max_bytes
        )));
    }

    Ok(())
}
