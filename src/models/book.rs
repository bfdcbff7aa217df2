// src/models/book.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the 'books' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub pages: i32,
    pub description: String,
    pub pdf_url: String,
    /// Media store handle, needed to delete or stream the PDF.
    pub pdf_public_id: String,
    pub created_at: DateTime<Utc>,
}

/// Text fields of the book upload form.
#[derive(Debug, Validate)]
pub struct BookForm {
    #[validate(length(min = 1, max = 300))]
    pub title: String,
    #[validate(length(min = 1, max = 200))]
    pub author: String,
    #[validate(range(min = 1, max = 100000))]
    pub pages: i32,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
}
