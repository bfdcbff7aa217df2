// src/handlers/messages.rs

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::message::{Message, SendMessageRequest},
    services::users::normalize_email,
    store::SharedStore,
    utils::{html::clean_html, jwt::Claims},
};

/// Sends a message from the caller's account to an email address.
pub async fn send_message(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let sender = store
        .get_user(claims.user_id()?)
        .await?
        .ok_or(AppError::AuthError("Account no longer exists".to_string()))?;

    let content = clean_html(&payload.content);
    if content.trim().is_empty() {
        return Err(AppError::BadRequest("Content is required.".to_string()));
    }

    let message = Message {
        id: Uuid::new_v4(),
        from_name: sender.display_name(),
        from_email: sender.email,
        from_role: sender.role.as_str().to_string(),
        to_email: normalize_email(&payload.to),
        subject: payload.subject.trim().to_string(),
        content,
        sent_at: Utc::now(),
    };

    store.insert_message(&message).await?;
    tracing::info!("Message {} sent to {}", message.id, message.to_email);

    Ok((StatusCode::CREATED, Json(message)))
}

/// Messages addressed to the caller, newest first.
pub async fn inbox(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let messages = store.inbox(&normalize_email(&claims.email)).await?;
    Ok(Json(messages))
}
