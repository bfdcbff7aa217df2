// src/services/progress.rs

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        course::Course,
        progress::{CourseProgressSummary, ProgressSnapshot, UserCourseProgress},
        quiz_attempt::QuizAttempt,
    },
    store::{Store, StoreError},
};

/// Integer percentage, rounded half up.
pub fn percentage(part: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as i32
}

/// Derives a user's progress on `course` from their quiz attempts.
///
/// A module is completed when it has at least one question and the latest
/// attempt on it scored at least `pass_threshold`. A course without quiz
/// modules is complete by definition.
pub fn compute_progress(
    course: &Course,
    attempts: &[QuizAttempt],
    pass_threshold: i32,
) -> ProgressSnapshot {
    let mut latest: HashMap<i32, &QuizAttempt> = HashMap::new();
    for attempt in attempts.iter().filter(|a| a.course_id == course.id) {
        latest
            .entry(attempt.module_index)
            .and_modify(|current| {
                if attempt.submitted_at > current.submitted_at {
                    *current = attempt;
                }
            })
            .or_insert(attempt);
    }

    let mut total = 0;
    let mut completed_modules = BTreeSet::new();

    for (index, module) in course.modules.iter().enumerate() {
        if !module.has_quiz() {
            continue;
        }
        total += 1;

        let index = index as i32;
        if latest
            .get(&index)
            .is_some_and(|attempt| attempt.score >= pass_threshold)
        {
            completed_modules.insert(index);
        }
    }

    if total == 0 {
        return ProgressSnapshot {
            progress: 100,
            completed_modules,
            completed: true,
        };
    }

    let done = completed_modules.len();
    ProgressSnapshot {
        progress: percentage(done, total),
        completed_modules,
        completed: done == total,
    }
}

/// Enrolls a user in a course. Returns the progress row and whether it is new.
pub async fn enroll(
    store: &dyn Store,
    course_id: Uuid,
    user_id: Uuid,
    pass_threshold: i32,
) -> Result<(UserCourseProgress, bool), AppError> {
    let existed = store.get_progress(course_id, user_id).await?.is_some();
    let progress = store
        .reconcile_progress(course_id, user_id, pass_threshold)
        .await?;
    Ok((progress, !existed))
}

/// Course list with progress for one user.
///
/// Each row is reconciled first, so edits to a course's modules show up
/// here the same way they do on the per-course progress read.
pub async fn list_user_courses(
    store: &dyn Store,
    user_id: Uuid,
    pass_threshold: i32,
) -> Result<Vec<CourseProgressSummary>, AppError> {
    let rows = store.list_user_progress(user_id).await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in rows {
        let progress = match store
            .reconcile_progress(row.course_id, user_id, pass_threshold)
            .await
        {
            Ok(progress) => progress,
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(course_id = %row.course_id, "Progress row without course, skipping");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let Some(course) = store.get_course(row.course_id).await? else {
            continue;
        };
        summaries.push(CourseProgressSummary {
            id: course.id,
            title: course.title,
            image_url: course.image_url,
            description: course.welcome,
            duration_hours: course.duration_hours,
            progress: progress.progress,
            completed: progress.completed,
        });
    }

    Ok(summaries)
}
