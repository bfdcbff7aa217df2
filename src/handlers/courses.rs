// src/handlers/courses.rs

use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::types::Json as JsonColumn;
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    media::{SharedMedia, UploadedFile},
    models::course::{
        Audience, Course, CourseResponse, CourseStatus, MediaFile, ParseEnumError, Participant,
        QuizAccess,
    },
    services::{course_form::CourseForm, progress},
    store::{SharedStore, Store},
    utils::{jwt::Claims, multipart::MultipartForm},
};

const IMAGE_FOLDER: &str = "courses";
const MODULE_FILE_FOLDER: &str = "courses/files";

async fn to_response(store: &dyn Store, course: &Course) -> Result<CourseResponse, AppError> {
    let count = store.count_quiz_accesses(course.id).await?;
    Ok(CourseResponse::new(course, count))
}

async fn find_course(store: &dyn Store, id: Uuid) -> Result<Course, AppError> {
    store
        .get_course(id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))
}

/// Best-effort removal of stored files that no record points to anymore.
async fn discard_media(media: &SharedMedia, public_ids: &[String]) {
    for public_id in public_ids {
        if let Err(e) = media.delete(public_id).await {
            tracing::warn!("Failed to delete media {}: {:?}", public_id, e);
        }
    }
}

async fn upload_module_files(
    media: &SharedMedia,
    files: &[UploadedFile],
) -> Result<Vec<MediaFile>, AppError> {
    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        let upload = match media.upload(MODULE_FILE_FOLDER, file).await {
            Ok(upload) => upload,
            Err(e) => {
                tracing::error!("Failed to store module file {}: {:?}", file.file_name, e);
                let orphaned: Vec<String> =
                    stored.iter().filter_map(|f: &MediaFile| f.public_id.clone()).collect();
                discard_media(media, &orphaned).await;
                return Err(e.into());
            }
        };
        stored.push(MediaFile {
            name: file.file_name.clone(),
            url: upload.url,
            public_id: Some(upload.public_id),
        });
    }
    Ok(stored)
}

/// Lists all courses, newest first. Answer keys are stripped.
pub async fn list_courses(
    State(store): State<SharedStore>,
) -> Result<impl IntoResponse, AppError> {
    let courses = store.list_courses().await?;

    let mut response = Vec::with_capacity(courses.len());
    for course in &courses {
        response.push(to_response(store.as_ref(), course).await?);
    }

    Ok(Json(response))
}

/// Lists published courses for one audience.
pub async fn list_by_audience(
    State(store): State<SharedStore>,
    Path(audience): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let audience: Audience = audience
        .parse()
        .map_err(|e: ParseEnumError| AppError::BadRequest(e.to_string()))?;

    let courses = store.list_published_courses(audience).await?;

    let mut response = Vec::with_capacity(courses.len());
    for course in &courses {
        response.push(to_response(store.as_ref(), course).await?);
    }

    Ok(Json(response))
}

/// Get a single course as learners see it.
pub async fn get_course(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let course = find_course(store.as_ref(), id).await?;
    Ok(Json(to_response(store.as_ref(), &course).await?))
}

/// Get a course including quiz answer keys.
/// Staff only.
pub async fn get_course_document(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let course = find_course(store.as_ref(), id).await?;
    Ok(Json(course))
}

/// Creates a course from a multipart form. The cover image is required.
/// Staff only.
pub async fn create_course(
    State(store): State<SharedStore>,
    State(media): State<SharedMedia>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let form = CourseForm::parse(MultipartForm::read(multipart).await?)?;

    let image = form
        .image
        .as_ref()
        .ok_or(AppError::BadRequest("Course image is required".to_string()))?;

    let cover = media.upload(IMAGE_FOLDER, image).await.map_err(|e| {
        tracing::error!("Failed to store course image: {:?}", e);
        AppError::from(e)
    })?;

    let module_files = match upload_module_files(&media, &form.module_files).await {
        Ok(files) => files,
        Err(e) => {
            discard_media(&media, &[cover.public_id]).await;
            return Err(e);
        }
    };

    let draft = form.draft;
    let course = Course {
        id: Uuid::new_v4(),
        title: draft.title,
        image_url: cover.url,
        image_public_id: Some(cover.public_id.clone()),
        tools: JsonColumn(draft.tools),
        learning_outcomes: JsonColumn(draft.learning_outcomes),
        duration_hours: draft.duration_hours,
        welcome: draft.welcome,
        modules: JsonColumn(draft.modules),
        module_files: JsonColumn(module_files),
        start_date: draft.start_date,
        end_date: draft.end_date,
        audience: draft.audience,
        status: CourseStatus::Pending,
        created_at: Utc::now(),
        updated_at: None,
    };

    if let Err(e) = store.insert_course(&course).await {
        tracing::error!("Failed to create course: {:?}", e);
        let mut orphaned = vec![cover.public_id];
        orphaned.extend(course.module_files.iter().filter_map(|f| f.public_id.clone()));
        discard_media(&media, &orphaned).await;
        return Err(e.into());
    }

    tracing::info!("Course '{}' created by {}", course.title, claims.email);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": course.id, "message": "Course created" })),
    ))
}

/// Replaces a course's fields. A missing image keeps the current one and
/// new module files are appended to the existing list.
/// Staff only.
pub async fn update_course(
    State(store): State<SharedStore>,
    State(media): State<SharedMedia>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let existing = find_course(store.as_ref(), id).await?;
    let form = CourseForm::parse(MultipartForm::read(multipart).await?)?;

    let new_cover = match &form.image {
        Some(image) => Some(media.upload(IMAGE_FOLDER, image).await?),
        None => None,
    };

    let added_files = match upload_module_files(&media, &form.module_files).await {
        Ok(files) => files,
        Err(e) => {
            if let Some(cover) = new_cover {
                discard_media(&media, &[cover.public_id]).await;
            }
            return Err(e);
        }
    };

    let mut module_files = existing.module_files.0.clone();
    module_files.extend(added_files);

    let draft = form.draft;
    let (image_url, image_public_id) = match &new_cover {
        Some(cover) => (cover.url.clone(), Some(cover.public_id.clone())),
        None => (existing.image_url.clone(), existing.image_public_id.clone()),
    };

    let course = Course {
        title: draft.title,
        image_url,
        image_public_id,
        tools: JsonColumn(draft.tools),
        learning_outcomes: JsonColumn(draft.learning_outcomes),
        duration_hours: draft.duration_hours,
        welcome: draft.welcome,
        modules: JsonColumn(draft.modules),
        module_files: JsonColumn(module_files),
        start_date: draft.start_date,
        end_date: draft.end_date,
        audience: draft.audience,
        updated_at: Some(Utc::now()),
        ..existing.clone()
    };

    if !store.update_course(&course).await? {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    // The old cover is only dropped once the new one is saved.
    if new_cover.is_some() {
        if let Some(old) = existing.image_public_id {
            discard_media(&media, &[old]).await;
        }
    }

    tracing::info!("Course {} updated", id);

    Ok(Json(json!({ "id": id, "message": "Course updated" })))
}

/// Marks a course as published.
/// Staff only.
pub async fn publish_course(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if !store.set_course_status(id, CourseStatus::Published).await? {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    tracing::info!("Course {} published", id);

    Ok(Json(json!({ "id": id, "status": CourseStatus::Published })))
}

/// Deletes a course with its attempts and progress, then its stored files.
/// Staff only.
pub async fn delete_course(
    State(store): State<SharedStore>,
    State(media): State<SharedMedia>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let course = find_course(store.as_ref(), id).await?;

    if !store.delete_course(id).await? {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    let mut stored: Vec<String> = course.image_public_id.into_iter().collect();
    stored.extend(course.module_files.0.into_iter().filter_map(|f| f.public_id));
    discard_media(&media, &stored).await;

    tracing::info!("Course {} deleted", id);

    Ok(Json(json!({ "message": "Course deleted", "id": id })))
}

/// Enrolls the caller. 201 on first enrollment, 200 when already enrolled.
pub async fn enroll(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let (progress, created) =
        progress::enroll(store.as_ref(), id, user_id, config.pass_threshold).await?;

    let status = if created {
        tracing::info!(%user_id, course_id = %id, "Enrolled");
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(progress)))
}

/// Enrolled users with their stored progress.
/// Staff only.
pub async fn list_participants(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    find_course(store.as_ref(), id).await?;

    let rows = store.list_course_progress(id).await?;

    let mut participants = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(user) = store.get_user(row.user_id).await? else {
            continue;
        };
        participants.push(Participant {
            user_id: user.id,
            name: user.display_name(),
            email: user.email,
            enrolled_at: row.enrolled_at,
            progress: row.progress,
        });
    }

    Ok(Json(participants))
}

/// Staff only.
pub async fn count_participants(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    find_course(store.as_ref(), id).await?;

    let count = store.list_course_progress(id).await?.len();
    Ok(Json(json!({ "course_id": id, "count": count })))
}

/// Records that the caller opened a module quiz. Repeats are ignored.
pub async fn record_quiz_access(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path((id, module_index)): Path<(Uuid, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let course = find_course(store.as_ref(), id).await?;
    if course.module(module_index).is_none() {
        return Err(AppError::NotFound("Module not found".to_string()));
    }

    let recorded = store
        .record_quiz_access(&QuizAccess {
            course_id: id,
            user_id,
            module_index,
            accessed_at: Utc::now(),
        })
        .await?;

    Ok(Json(json!({ "recorded": recorded })))
}
