// src/handlers/books.rs

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::MAX_BOOK_BYTES,
    error::AppError,
    media::SharedMedia,
    models::book::{Book, BookForm},
    store::SharedStore,
    utils::multipart::{MultipartForm, ensure_file},
};

const PDF_FIELD: &str = "pdf";
const BOOK_FOLDER: &str = "books";

/// Lists books, newest first.
pub async fn list_books(State(store): State<SharedStore>) -> Result<impl IntoResponse, AppError> {
    let books = store.list_books().await?;
    Ok(Json(books))
}

/// Uploads a PDF book with its metadata.
/// Staff only.
pub async fn upload_book(
    State(store): State<SharedStore>,
    State(media): State<SharedMedia>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = MultipartForm::read(multipart).await?;

    let pages_raw = form.require_text("pages")?;
    let pages = pages_raw.parse::<i32>().map_err(|_| {
        AppError::BadRequest(format!("Field 'pages' must be a number, got '{}'", pages_raw))
    })?;

    let fields = BookForm {
        title: form.require_text("title")?.to_string(),
        author: form.require_text("author")?.to_string(),
        pages,
        description: form.require_text("description")?.to_string(),
    };
    if let Err(validation_errors) = fields.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut pdfs = form.take_files(PDF_FIELD);
    form.reject_unexpected_files()?;
    let pdf = match (pdfs.pop(), pdfs.is_empty()) {
        (Some(pdf), true) => pdf,
        (Some(_), false) => {
            return Err(AppError::BadRequest("Only one PDF per book".to_string()));
        }
        (None, _) => return Err(AppError::BadRequest("Field 'pdf' is required".to_string())),
    };
    ensure_file(&pdf, PDF_FIELD, &["application/pdf"], MAX_BOOK_BYTES)?;

    let stored = media.upload(BOOK_FOLDER, &pdf).await.map_err(|e| {
        tracing::error!("Failed to store book PDF: {:?}", e);
        AppError::from(e)
    })?;

    let book = Book {
        id: Uuid::new_v4(),
        title: fields.title,
        author: fields.author,
        pages: fields.pages,
        description: fields.description,
        pdf_url: stored.url,
        pdf_public_id: stored.public_id,
        created_at: Utc::now(),
    };

    if let Err(e) = store.insert_book(&book).await {
        tracing::error!("Failed to save book: {:?}", e);
        if let Err(e) = media.delete(&book.pdf_public_id).await {
            tracing::warn!("Failed to delete orphaned PDF: {:?}", e);
        }
        return Err(e.into());
    }

    tracing::info!("Book '{}' uploaded", book.title);

    Ok((StatusCode::CREATED, Json(book)))
}

/// Deletes a book and its stored PDF.
/// Staff only.
pub async fn delete_book(
    State(store): State<SharedStore>,
    State(media): State<SharedMedia>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let book = store
        .get_book(id)
        .await?
        .ok_or(AppError::NotFound("Book not found".to_string()))?;

    store.delete_book(id).await?;

    if let Err(e) = media.delete(&book.pdf_public_id).await {
        tracing::warn!("Failed to delete PDF {}: {:?}", book.pdf_public_id, e);
    }

    Ok(Json(json!({ "message": "Book deleted", "id": id })))
}

/// Streams a book's PDF for inline viewing.
pub async fn download_book(
    State(store): State<SharedStore>,
    State(media): State<SharedMedia>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let book = store
        .get_book(id)
        .await?
        .ok_or(AppError::NotFound("Book not found".to_string()))?;

    let bytes = media.open(&book.pdf_public_id).await?;

    let disposition = format!("inline; filename=\"{}.pdf\"", download_name(&book.title));

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// Header-safe file name derived from a title.
fn download_name(title: &str) -> String {
    let name: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let name = name.trim_matches('_');
    if name.is_empty() { "book".to_string() } else { name.to_string() }
}
