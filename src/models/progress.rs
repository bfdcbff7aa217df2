// src/models/progress.rs

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

/// Represents the 'course_progress' table: one row per (course, user).
///
/// A derived cache of quiz attempts. The row doubles as the enrollment
/// record, so `enrolled_at` is written once and never overwritten.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserCourseProgress {
    pub course_id: Uuid,
    pub user_id: Uuid,
    /// Percentage 0-100.
    pub progress: i32,
    pub completed_modules: Json<BTreeSet<i32>>,
    pub completed: bool,
    pub enrolled_at: DateTime<Utc>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of recomputing progress from raw attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub progress: i32,
    pub completed_modules: BTreeSet<i32>,
    pub completed: bool,
}

impl UserCourseProgress {
    /// Fresh enrollment row before any reconciliation.
    pub fn enrolled(course_id: Uuid, user_id: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            course_id,
            user_id,
            progress: 0,
            completed_modules: Json(BTreeSet::new()),
            completed: false,
            enrolled_at: at,
            last_activity_at: None,
            updated_at: None,
        }
    }

    /// Merges a snapshot in, leaving enrollment data alone.
    pub fn apply(&mut self, snapshot: ProgressSnapshot, at: DateTime<Utc>) {
        self.progress = snapshot.progress;
        self.completed_modules = Json(snapshot.completed_modules);
        self.completed = snapshot.completed;
        self.last_activity_at = Some(at);
        self.updated_at = Some(at);
    }
}

/// One line of a learner's course list.
#[derive(Debug, Clone, Serialize)]
pub struct CourseProgressSummary {
    pub id: Uuid,
    pub title: String,
    pub image_url: String,
    pub description: String,
    pub duration_hours: i32,
    pub progress: i32,
    pub completed: bool,
}
