// src/models/message.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the 'messages' table. Addressed by email, not by user id.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from_email: String,
    pub from_name: String,
    pub from_role: String,
    pub to_email: String,
    pub subject: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

/// DTO for sending a message. The sender comes from the token.
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(email(message = "Recipient email is invalid."))]
    pub to: String,
    #[validate(length(min = 1, max = 200, message = "Subject is required."))]
    pub subject: String,
    #[validate(length(min = 1, max = 10000, message = "Content is required."))]
    pub content: String,
}
