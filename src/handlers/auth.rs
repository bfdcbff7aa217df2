// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, RegisterRequest},
    services::users,
    store::SharedStore,
};

/// Registers a new account.
///
/// The account starts unapproved; an admin must approve it before login.
/// Returns 201 Created with the new user id.
pub async fn register(
    State(store): State<SharedStore>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::register_user(store.as_ref(), payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration received, pending approval",
            "user_id": user.id
        })),
    ))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (token, user) = users::authenticate(store.as_ref(), &config, payload).await?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "user": user
    })))
}
