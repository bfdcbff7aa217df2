// src/services/certificates.rs

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::certificate::Certificate,
    store::{Store, StoreError},
};

/// Human-readable certificate code: `GP-<COURSE>-<USER>-<TIME>-<SERIAL>`.
///
/// Course and user parts are the first four hex digits of each id, the time
/// part is the issuance second in base 36. The serial is four hex digits of
/// `serial`, so two holders sharing id prefixes in the same second still differ.
pub fn certificate_code(
    course_id: Uuid,
    user_id: Uuid,
    issued_at: DateTime<Utc>,
    serial: Uuid,
) -> String {
    let course = &course_id.simple().to_string()[..4];
    let user = &user_id.simple().to_string()[..4];
    let stamp = to_base36(issued_at.timestamp().max(0) as u64);
    let serial = &serial.simple().to_string()[..4];
    format!("GP-{}-{}-{}-{}", course, user, stamp, serial).to_ascii_uppercase()
}

const CODE_ATTEMPTS: usize = 3;

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Finalization outcome. `created` is false when an earlier certificate was returned.
#[derive(Debug, Clone)]
pub struct Finalized {
    pub certificate: Certificate,
    pub created: bool,
}

/// Issues the course certificate for a user.
///
/// Completion is recomputed from raw quiz attempts, never read from the
/// cached progress flag. An existing certificate is returned as is, with
/// the holder name refreshed if the account name changed.
pub async fn finalize_course(
    store: &dyn Store,
    user_id: Uuid,
    course_id: Uuid,
    pass_threshold: i32,
) -> Result<Finalized, AppError> {
    let user = store
        .get_user(user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let course = store
        .get_course(course_id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    let progress = store
        .reconcile_progress(course_id, user_id, pass_threshold)
        .await?;

    if !progress.completed {
        return Err(AppError::BadRequest(format!(
            "Course not completed yet ({}%)",
            progress.progress
        )));
    }

    let user_name = user.display_name();

    if let Some(mut existing) = store.find_certificate(user_id, course_id).await? {
        if existing.user_name != user_name {
            store
                .rename_certificate_holder(existing.id, &user_name)
                .await?;
            existing.user_name = user_name;
        }
        return Ok(Finalized {
            certificate: existing,
            created: false,
        });
    }

    let issued_at = Utc::now();
    let mut attempt = 0;
    let (stored, candidate_id) = loop {
        attempt += 1;
        let candidate = Certificate {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            code: certificate_code(course_id, user_id, issued_at, Uuid::new_v4()),
            user_name: user_name.clone(),
            course_name: course.title.clone(),
            issued_at,
        };

        match store.insert_certificate_if_absent(&candidate).await {
            Ok(stored) => break (stored, candidate.id),
            Err(StoreError::Duplicate(msg)) if attempt < CODE_ATTEMPTS => {
                tracing::warn!(%user_id, %course_id, "{}, retrying with a new code", msg);
            }
            Err(e) => return Err(e.into()),
        }
    };

    let created = stored.id == candidate_id;
    if created {
        tracing::info!(%user_id, %course_id, code = %stored.code, "Certificate issued");
    }

    Ok(Finalized {
        certificate: stored,
        created,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::course::{Audience, Course, CourseStatus, MediaFile};
    use crate::models::user::{Role, User};
    use crate::store::memory::MemoryStore;
    use chrono::TimeZone;
    use sqlx::types::Json;

    #[test]
    fn test_code_format() {
        let course = Uuid::parse_str("abcd1234-0000-0000-0000-000000000000").unwrap();
        let user = Uuid::parse_str("9f8e7d6c-0000-0000-0000-000000000000").unwrap();
        let serial = Uuid::parse_str("0a1b2c3d-0000-0000-0000-000000000000").unwrap();
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let code = certificate_code(course, user, at, serial);
        assert_eq!(
            code,
            format!("GP-ABCD-9F8E-{}-0A1B", to_base36(1_700_000_000).to_uppercase())
        );
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_shared_id_prefixes_get_distinct_codes() {
        let course = Uuid::new_v4();
        let first = Uuid::parse_str("abcd0000-0000-0000-0000-000000000000").unwrap();
        let second = Uuid::parse_str("abcd1111-0000-0000-0000-000000000000").unwrap();
        let at = Utc::now();

        assert_ne!(
            certificate_code(course, first, at, Uuid::new_v4()),
            certificate_code(course, second, at, Uuid::new_v4())
        );
    }

    fn holder(first_name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: first_name.to_string(),
            last_name: "Rojas".to_string(),
            email: "ana@example.org".to_string(),
            birth_date: None,
            role: Role::Student,
            password: String::new(),
            approved: true,
            profile_image_url: None,
            created_at: Utc::now(),
        }
    }

    fn empty_course() -> Course {
        Course {
            id: Uuid::new_v4(),
            title: "Beekeeping".to_string(),
            image_url: "http://localhost/uploads/courses/x.png".to_string(),
            image_public_id: None,
            tools: Json(vec![]),
            learning_outcomes: Json(vec![]),
            duration_hours: 1,
            welcome: String::new(),
            modules: Json(vec![]),
            module_files: Json(Vec::<MediaFile>::new()),
            start_date: None,
            end_date: None,
            audience: Audience::Student,
            status: CourseStatus::Published,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_finalize_twice_refreshes_holder_name() {
        // Arrange
        let store = MemoryStore::new();
        let user = holder("Ana");
        let course = empty_course();
        store.insert_user(&user).await.unwrap();
        store.insert_course(&course).await.unwrap();

        let first = finalize_course(&store, user.id, course.id, 70).await.unwrap();
        assert!(first.created);
        assert_eq!(first.certificate.user_name, "Ana Rojas");

        // Same account, new name.
        store.delete_user(user.id).await.unwrap();
        let renamed = User {
            first_name: "Anabel".to_string(),
            ..user.clone()
        };
        store.insert_user(&renamed).await.unwrap();

        // Act
        let second = finalize_course(&store, user.id, course.id, 70).await.unwrap();

        // Assert
        assert!(!second.created);
        assert_eq!(second.certificate.id, first.certificate.id);
        assert_eq!(second.certificate.code, first.certificate.code);
        assert_eq!(second.certificate.user_name, "Anabel Rojas");

        let stored = store
            .get_certificate(first.certificate.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.user_name, "Anabel Rojas");
    }
}
