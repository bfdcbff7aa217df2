// src/handlers/certificates.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    config::Config,
    error::AppError,
    models::certificate::CertificateResponse,
    services::certificates,
    store::SharedStore,
    utils::jwt::Claims,
};

/// Issues (or returns) the caller's certificate for a completed course.
/// 201 when a new certificate was created, 200 when it already existed.
pub async fn finalize(
    State(store): State<SharedStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let finalized =
        certificates::finalize_course(store.as_ref(), user_id, course_id, config.pass_threshold)
            .await?;

    let status = if finalized.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(CertificateResponse::from(finalized.certificate))))
}

/// Diploma data for one certificate. Holder or admin.
pub async fn get_certificate(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let certificate = store
        .get_certificate(id)
        .await?
        .ok_or(AppError::NotFound("Certificate not found".to_string()))?;

    claims.ensure_self_or_admin(certificate.user_id)?;

    Ok(Json(CertificateResponse::from(certificate)))
}

/// A user's certificates, newest first. Self or admin.
pub async fn list_user_certificates(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.ensure_self_or_admin(user_id)?;

    let certificates: Vec<CertificateResponse> = store
        .list_user_certificates(user_id)
        .await?
        .into_iter()
        .map(CertificateResponse::from)
        .collect();

    Ok(Json(certificates))
}
