// src/handlers/users.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::UpdateProfileRequest,
    services::{progress, users::normalize_email},
    store::SharedStore,
    utils::jwt::Claims,
};

/// Get a user's profile. Self or admin.
pub async fn get_profile(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.ensure_self_or_admin(user_id)?;

    let user = store
        .get_user(user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Update email and/or profile image URL. Self or admin.
pub async fn update_profile(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.ensure_self_or_admin(user_id)?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let email = payload.email.as_deref().map(normalize_email);
    let user = store
        .update_user_profile(user_id, email.as_deref(), payload.profile_image_url.as_deref())
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    tracing::info!(%user_id, "Profile updated");

    Ok(Json(user))
}

/// Courses a user is enrolled in, with progress. Self or admin.
pub async fn list_courses(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.ensure_self_or_admin(user_id)?;

    let courses = progress::list_user_courses(store.as_ref(), user_id, config.pass_threshold).await?;
    Ok(Json(courses))
}

/// Removes the caller's enrollment (progress record) from a course.
pub async fn unenroll(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    if !store.delete_progress(course_id, user_id).await? {
        return Err(AppError::NotFound("Enrollment not found".to_string()));
    }

    tracing::info!(%user_id, %course_id, "Unenrolled");

    Ok(Json(json!({ "message": "Unenrolled from course" })))
}
