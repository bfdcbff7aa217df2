// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{error::AppError, store::SharedStore, utils::jwt::Claims};

/// Lists all users in the system, newest first.
/// Admin only.
pub async fn list_users(State(store): State<SharedStore>) -> Result<impl IntoResponse, AppError> {
    let users = store.list_users().await?;
    Ok(Json(users))
}

/// Approves a pending account so it can log in.
/// Admin only.
pub async fn approve_user(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = store
        .get_user(id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if user.approved {
        return Err(AppError::BadRequest("User is already approved".to_string()));
    }

    store.set_user_approved(id, true).await?;
    tracing::info!("User {} approved", user.email);

    Ok(Json(json!({ "message": "User approved", "id": id })))
}

/// Deletes a user.
/// Admin only. Admins cannot delete themselves.
pub async fn delete_user(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if claims.user_id()? == id {
        return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
    }

    if !store.delete_user(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!("User {} deleted by {}", id, claims.email);

    Ok(Json(json!({ "message": "User deleted", "id": id })))
}

/// Every stored attempt on a course, newest first.
/// Admin only.
pub async fn list_course_attempts(
    State(store): State<SharedStore>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if store.get_course(course_id).await?.is_none() {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    let attempts = store.list_course_attempts(course_id).await?;
    Ok(Json(attempts))
}
