// src/store/mod.rs

//! Document store collaborator.
//!
//! Handlers and services only see the [`Store`] trait; `main` injects the
//! Postgres implementation and tests inject [`memory::MemoryStore`].

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    book::Book,
    certificate::Certificate,
    course::{Audience, Course, CourseStatus, QuizAccess},
    message::Message,
    progress::UserCourseProgress,
    quiz_attempt::QuizAttempt,
    user::User,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The named entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Duplicate record: {0}")]
    Duplicate(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub type SharedStore = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
    // Users
    /// Fails with `Duplicate` when the email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;
    async fn set_user_approved(&self, id: Uuid, approved: bool) -> StoreResult<bool>;
    /// Updates the given fields only. Fails with `Duplicate` on email collision.
    async fn update_user_profile(
        &self,
        id: Uuid,
        email: Option<&str>,
        profile_image_url: Option<&str>,
    ) -> StoreResult<Option<User>>;

    // Courses
    async fn insert_course(&self, course: &Course) -> StoreResult<()>;
    async fn update_course(&self, course: &Course) -> StoreResult<bool>;
    async fn get_course(&self, id: Uuid) -> StoreResult<Option<Course>>;
    /// Newest first.
    async fn list_courses(&self) -> StoreResult<Vec<Course>>;
    async fn list_published_courses(&self, audience: Audience) -> StoreResult<Vec<Course>>;
    async fn set_course_status(&self, id: Uuid, status: CourseStatus) -> StoreResult<bool>;
    /// Removes the course with its attempts, accesses and progress rows.
    /// Certificates are kept.
    async fn delete_course(&self, id: Uuid) -> StoreResult<bool>;

    // Quiz access log
    /// Returns false when the access was already recorded.
    async fn record_quiz_access(&self, access: &QuizAccess) -> StoreResult<bool>;
    async fn count_quiz_accesses(&self, course_id: Uuid) -> StoreResult<i64>;

    // Quiz attempts
    /// Overwrites any previous attempt for the same (user, course, module),
    /// keeping the original attempt id.
    async fn upsert_attempt(&self, attempt: &QuizAttempt) -> StoreResult<QuizAttempt>;
    async fn get_attempt(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        module_index: i32,
    ) -> StoreResult<Option<QuizAttempt>>;
    async fn list_attempts(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<Vec<QuizAttempt>>;
    async fn list_course_attempts(&self, course_id: Uuid) -> StoreResult<Vec<QuizAttempt>>;

    // Progress
    async fn get_progress(&self, course_id: Uuid, user_id: Uuid)
    -> StoreResult<Option<UserCourseProgress>>;
    async fn list_course_progress(&self, course_id: Uuid) -> StoreResult<Vec<UserCourseProgress>>;
    async fn list_user_progress(&self, user_id: Uuid) -> StoreResult<Vec<UserCourseProgress>>;
    async fn delete_progress(&self, course_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    /// Recomputes progress from the course and the user's attempts and merges
    /// it into the progress row (creating it if needed), as one atomic step.
    /// Fails with `NotFound("Course")` without writing when the course is gone.
    async fn reconcile_progress(
        &self,
        course_id: Uuid,
        user_id: Uuid,
        pass_threshold: i32,
    ) -> StoreResult<UserCourseProgress>;

    // Certificates
    async fn get_certificate(&self, id: Uuid) -> StoreResult<Option<Certificate>>;
    async fn find_certificate(&self, user_id: Uuid, course_id: Uuid)
    -> StoreResult<Option<Certificate>>;
    /// Newest first.
    async fn list_user_certificates(&self, user_id: Uuid) -> StoreResult<Vec<Certificate>>;
    /// Inserts unless a certificate for the pair exists; returns whichever is stored.
    /// Fails with `Duplicate` when the code belongs to another pair.
    async fn insert_certificate_if_absent(&self, certificate: &Certificate)
    -> StoreResult<Certificate>;
    async fn rename_certificate_holder(&self, id: Uuid, user_name: &str) -> StoreResult<()>;

    // Messages
    async fn insert_message(&self, message: &Message) -> StoreResult<()>;
    /// Messages addressed to `email`, newest first.
    async fn inbox(&self, email: &str) -> StoreResult<Vec<Message>>;

    // Books
    async fn insert_book(&self, book: &Book) -> StoreResult<()>;
    /// Newest first.
    async fn list_books(&self) -> StoreResult<Vec<Book>>;
    async fn get_book(&self, id: Uuid) -> StoreResult<Option<Book>>;
    async fn delete_book(&self, id: Uuid) -> StoreResult<bool>;
}
