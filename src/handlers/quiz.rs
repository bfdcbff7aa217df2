// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    models::quiz_attempt::SubmitAnswersRequest,
    services::{progress, scoring},
    store::SharedStore,
    utils::jwt::Claims,
};

/// Grades the caller's answers for one module and updates course progress.
///
/// Answers are matched to questions by position. Resubmitting replaces the
/// previous attempt for the module.
pub async fn submit_answers(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path((course_id, module_index)): Path<(Uuid, i32)>,
    Json(payload): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let submission = scoring::submit_quiz(
        store.as_ref(),
        user_id,
        course_id,
        module_index,
        &payload.answers,
        config.pass_threshold,
    )
    .await?;

    Ok(Json(json!({
        "attempt": submission.attempt,
        "passed": submission.passed,
        "progress": submission.progress
    })))
}

/// The caller's current attempt on a module.
pub async fn get_attempt(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path((course_id, module_index)): Path<(Uuid, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempt = store
        .get_attempt(user_id, course_id, module_index)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    Ok(Json(attempt))
}

/// All of the caller's attempts on a course, by module.
pub async fn list_my_attempts(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let attempts = store.list_attempts(user_id, course_id).await?;
    Ok(Json(attempts))
}

/// The caller's progress on a course, recomputed from their attempts.
pub async fn get_progress(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    if store.get_progress(course_id, user_id).await?.is_none() {
        return Err(AppError::NotFound("Not enrolled in this course".to_string()));
    }

    let progress = store
        .reconcile_progress(course_id, user_id, config.pass_threshold)
        .await?;

    Ok(Json(progress))
}

/// Every course the caller is enrolled in, with progress.
pub async fn my_courses_progress(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let courses = progress::list_user_courses(store.as_ref(), user_id, config.pass_threshold).await?;
    Ok(Json(courses))
}
