// src/store/postgres.rs

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, types::Json};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::{
    models::{
        book::Book,
        certificate::Certificate,
        course::{Audience, Course, CourseStatus, QuizAccess},
        message::Message,
        progress::UserCourseProgress,
        quiz_attempt::QuizAttempt,
        user::User,
    },
    services::progress::compute_progress,
};

const USER_COLUMNS: &str = "id, first_name, last_name, email, birth_date, role, password, \
     approved, profile_image_url, created_at";

const COURSE_COLUMNS: &str = "id, title, image_url, image_public_id, tools, learning_outcomes, \
     duration_hours, welcome, modules, module_files, start_date, end_date, audience, status, \
     created_at, updated_at";

const ATTEMPT_COLUMNS: &str = "id, user_id, course_id, module_index, answers, correct_count, \
     total_questions, score, submitted_at";

const PROGRESS_COLUMNS: &str = "course_id, user_id, progress, completed_modules, completed, \
     enrolled_at, last_activity_at, updated_at";

const CERTIFICATE_COLUMNS: &str = "id, user_id, course_id, code, user_name, course_name, issued_at";

const MESSAGE_COLUMNS: &str =
    "id, from_email, from_name, from_role, to_email, subject, content, sent_at";

const BOOK_COLUMNS: &str =
    "id, title, author, pages, description, pdf_url, pdf_public_id, created_at";

/// Postgres-backed store. Multi-row invariants are kept inside transactions.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps unique-constraint violations to `Duplicate`, everything else passes through.
fn unique_violation(e: sqlx::Error, message: impl FnOnce() -> String) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(message()),
        _ => StoreError::Sqlx(e),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, birth_date, role, password, approved, profile_image_url, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.birth_date)
        .bind(user.role.as_str())
        .bind(&user.password)
        .bind(user.approved)
        .bind(&user.profile_image_url)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_violation(e, || format!("Email '{}' is already registered", user.email)))?;

        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY created_at DESC", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_user_approved(&self, id: Uuid, approved: bool) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET approved = $1 WHERE id = $2")
            .bind(approved)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        email: Option<&str>,
        profile_image_url: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let sql = format!(
            "UPDATE users
             SET email = COALESCE($1, email),
                 profile_image_url = COALESCE($2, profile_image_url)
             WHERE id = $3
             RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(profile_image_url)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                unique_violation(e, || {
                    format!("Email '{}' is already in use", email.unwrap_or_default())
                })
            })
    }

    async fn insert_course(&self, course: &Course) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO courses (id, title, image_url, image_public_id, tools, learning_outcomes, duration_hours,
                                  welcome, modules, module_files, start_date, end_date, audience, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(course.id)
        .bind(&course.title)
        .bind(&course.image_url)
        .bind(&course.image_public_id)
        .bind(&course.tools)
        .bind(&course.learning_outcomes)
        .bind(course.duration_hours)
        .bind(&course.welcome)
        .bind(&course.modules)
        .bind(&course.module_files)
        .bind(course.start_date)
        .bind(course.end_date)
        .bind(course.audience.as_str())
        .bind(course.status.as_str())
        .bind(course.created_at)
        .bind(course.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_course(&self, course: &Course) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE courses
             SET title = $1, image_url = $2, image_public_id = $3, tools = $4, learning_outcomes = $5,
                 duration_hours = $6, welcome = $7, modules = $8, module_files = $9, start_date = $10,
                 end_date = $11, audience = $12, status = $13, updated_at = $14
             WHERE id = $15",
        )
        .bind(&course.title)
        .bind(&course.image_url)
        .bind(&course.image_public_id)
        .bind(&course.tools)
        .bind(&course.learning_outcomes)
        .bind(course.duration_hours)
        .bind(&course.welcome)
        .bind(&course.modules)
        .bind(&course.module_files)
        .bind(course.start_date)
        .bind(course.end_date)
        .bind(course.audience.as_str())
        .bind(course.status.as_str())
        .bind(course.updated_at)
        .bind(course.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        let sql = format!("SELECT {} FROM courses WHERE id = $1", COURSE_COLUMNS);
        Ok(sqlx::query_as::<_, Course>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let sql = format!("SELECT {} FROM courses ORDER BY created_at DESC", COURSE_COLUMNS);
        Ok(sqlx::query_as::<_, Course>(&sql).fetch_all(&self.pool).await?)
    }

    async fn list_published_courses(&self, audience: Audience) -> StoreResult<Vec<Course>> {
        let sql = format!(
            "SELECT {} FROM courses WHERE status = $1 AND audience = $2 ORDER BY created_at DESC",
            COURSE_COLUMNS
        );
        Ok(sqlx::query_as::<_, Course>(&sql)
            .bind(CourseStatus::Published.as_str())
            .bind(audience.as_str())
            .fetch_all(&self.pool)
            .await?)
    }

    async fn set_course_status(&self, id: Uuid, status: CourseStatus) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE courses SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_course(&self, id: Uuid) -> StoreResult<bool> {
        // Attempts, accesses and progress go with the course via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_quiz_access(&self, access: &QuizAccess) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO quiz_accesses (course_id, user_id, module_index, accessed_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (course_id, user_id, module_index) DO NOTHING",
        )
        .bind(access.course_id)
        .bind(access.user_id)
        .bind(access.module_index)
        .bind(access.accessed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_quiz_accesses(&self, course_id: Uuid) -> StoreResult<i64> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quiz_accesses WHERE course_id = $1")
                .bind(course_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn upsert_attempt(&self, attempt: &QuizAttempt) -> StoreResult<QuizAttempt> {
        let sql = format!(
            "INSERT INTO quiz_attempts (id, user_id, course_id, module_index, answers, correct_count, total_questions, score, submitted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (user_id, course_id, module_index) DO UPDATE
             SET answers = EXCLUDED.answers,
                 correct_count = EXCLUDED.correct_count,
                 total_questions = EXCLUDED.total_questions,
                 score = EXCLUDED.score,
                 submitted_at = EXCLUDED.submitted_at
             RETURNING {}",
            ATTEMPT_COLUMNS
        );
        Ok(sqlx::query_as::<_, QuizAttempt>(&sql)
            .bind(attempt.id)
            .bind(attempt.user_id)
            .bind(attempt.course_id)
            .bind(attempt.module_index)
            .bind(&attempt.answers)
            .bind(attempt.correct_count)
            .bind(attempt.total_questions)
            .bind(attempt.score)
            .bind(attempt.submitted_at)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn get_attempt(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        module_index: i32,
    ) -> StoreResult<Option<QuizAttempt>> {
        let sql = format!(
            "SELECT {} FROM quiz_attempts WHERE user_id = $1 AND course_id = $2 AND module_index = $3",
            ATTEMPT_COLUMNS
        );
        Ok(sqlx::query_as::<_, QuizAttempt>(&sql)
            .bind(user_id)
            .bind(course_id)
            .bind(module_index)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_attempts(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<Vec<QuizAttempt>> {
        let sql = format!(
            "SELECT {} FROM quiz_attempts WHERE user_id = $1 AND course_id = $2 ORDER BY module_index",
            ATTEMPT_COLUMNS
        );
        Ok(sqlx::query_as::<_, QuizAttempt>(&sql)
            .bind(user_id)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_course_attempts(&self, course_id: Uuid) -> StoreResult<Vec<QuizAttempt>> {
        let sql = format!(
            "SELECT {} FROM quiz_attempts WHERE course_id = $1 ORDER BY submitted_at DESC",
            ATTEMPT_COLUMNS
        );
        Ok(sqlx::query_as::<_, QuizAttempt>(&sql)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_progress(
        &self,
        course_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<UserCourseProgress>> {
        let sql = format!(
            "SELECT {} FROM course_progress WHERE course_id = $1 AND user_id = $2",
            PROGRESS_COLUMNS
        );
        Ok(sqlx::query_as::<_, UserCourseProgress>(&sql)
            .bind(course_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_course_progress(&self, course_id: Uuid) -> StoreResult<Vec<UserCourseProgress>> {
        let sql = format!(
            "SELECT {} FROM course_progress WHERE course_id = $1 ORDER BY enrolled_at",
            PROGRESS_COLUMNS
        );
        Ok(sqlx::query_as::<_, UserCourseProgress>(&sql)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_user_progress(&self, user_id: Uuid) -> StoreResult<Vec<UserCourseProgress>> {
        let sql = format!(
            "SELECT {} FROM course_progress WHERE user_id = $1 ORDER BY enrolled_at DESC",
            PROGRESS_COLUMNS
        );
        Ok(sqlx::query_as::<_, UserCourseProgress>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_progress(&self, course_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM course_progress WHERE course_id = $1 AND user_id = $2")
            .bind(course_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reconcile_progress(
        &self,
        course_id: Uuid,
        user_id: Uuid,
        pass_threshold: i32,
    ) -> StoreResult<UserCourseProgress> {
        let mut tx = self.pool.begin().await?;

        // Shared lock: the course cannot be deleted or edited mid-reconcile.
        let course_sql = format!("SELECT {} FROM courses WHERE id = $1 FOR SHARE", COURSE_COLUMNS);
        let course = sqlx::query_as::<_, Course>(&course_sql)
            .bind(course_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound("Course"))?;

        let user_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        if !user_exists {
            return Err(StoreError::NotFound("User"));
        }

        sqlx::query(
            "INSERT INTO course_progress (course_id, user_id, enrolled_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (course_id, user_id) DO NOTHING",
        )
        .bind(course_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        // Row lock serializes concurrent reconciles of the same pair.
        sqlx::query("SELECT 1 FROM course_progress WHERE course_id = $1 AND user_id = $2 FOR UPDATE")
            .bind(course_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let attempts_sql = format!(
            "SELECT {} FROM quiz_attempts WHERE user_id = $1 AND course_id = $2",
            ATTEMPT_COLUMNS
        );
        let attempts = sqlx::query_as::<_, QuizAttempt>(&attempts_sql)
            .bind(user_id)
            .bind(course_id)
            .fetch_all(&mut *tx)
            .await?;

        let snapshot = compute_progress(&course, &attempts, pass_threshold);

        let update_sql = format!(
            "UPDATE course_progress
             SET progress = $1, completed_modules = $2, completed = $3,
                 last_activity_at = $4, updated_at = $4
             WHERE course_id = $5 AND user_id = $6
             RETURNING {}",
            PROGRESS_COLUMNS
        );
        let row = sqlx::query_as::<_, UserCourseProgress>(&update_sql)
            .bind(snapshot.progress)
            .bind(Json(&snapshot.completed_modules))
            .bind(snapshot.completed)
            .bind(Utc::now())
            .bind(course_id)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn get_certificate(&self, id: Uuid) -> StoreResult<Option<Certificate>> {
        let sql = format!("SELECT {} FROM certificates WHERE id = $1", CERTIFICATE_COLUMNS);
        Ok(sqlx::query_as::<_, Certificate>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_certificate(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Option<Certificate>> {
        let sql = format!(
            "SELECT {} FROM certificates WHERE user_id = $1 AND course_id = $2",
            CERTIFICATE_COLUMNS
        );
        Ok(sqlx::query_as::<_, Certificate>(&sql)
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_user_certificates(&self, user_id: Uuid) -> StoreResult<Vec<Certificate>> {
        let sql = format!(
            "SELECT {} FROM certificates WHERE user_id = $1 ORDER BY issued_at DESC",
            CERTIFICATE_COLUMNS
        );
        Ok(sqlx::query_as::<_, Certificate>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_certificate_if_absent(
        &self,
        certificate: &Certificate,
    ) -> StoreResult<Certificate> {
        let sql = format!(
            "INSERT INTO certificates (id, user_id, course_id, code, user_name, course_name, issued_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (user_id, course_id) DO NOTHING
             RETURNING {}",
            CERTIFICATE_COLUMNS
        );
        let inserted = sqlx::query_as::<_, Certificate>(&sql)
            .bind(certificate.id)
            .bind(certificate.user_id)
            .bind(certificate.course_id)
            .bind(&certificate.code)
            .bind(&certificate.user_name)
            .bind(&certificate.course_name)
            .bind(certificate.issued_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unique_violation(e, || format!("Certificate code '{}'", certificate.code)))?;

        if let Some(inserted) = inserted {
            return Ok(inserted);
        }

        // Lost the race: someone else issued it first.
        self.find_certificate(certificate.user_id, certificate.course_id)
            .await?
            .ok_or(StoreError::NotFound("Certificate"))
    }

    async fn rename_certificate_holder(&self, id: Uuid, user_name: &str) -> StoreResult<()> {
        sqlx::query("UPDATE certificates SET user_name = $1 WHERE id = $2")
            .bind(user_name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO messages (id, from_email, from_name, from_role, to_email, subject, content, sent_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(message.id)
        .bind(&message.from_email)
        .bind(&message.from_name)
        .bind(&message.from_role)
        .bind(&message.to_email)
        .bind(&message.subject)
        .bind(&message.content)
        .bind(message.sent_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn inbox(&self, email: &str) -> StoreResult<Vec<Message>> {
        let sql = format!(
            "SELECT {} FROM messages WHERE to_email = $1 ORDER BY sent_at DESC",
            MESSAGE_COLUMNS
        );
        Ok(sqlx::query_as::<_, Message>(&sql)
            .bind(email)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_book(&self, book: &Book) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO books (id, title, author, pages, description, pdf_url, pdf_public_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.pages)
        .bind(&book.description)
        .bind(&book.pdf_url)
        .bind(&book.pdf_public_id)
        .bind(book.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_books(&self) -> StoreResult<Vec<Book>> {
        let sql = format!("SELECT {} FROM books ORDER BY created_at DESC", BOOK_COLUMNS);
        Ok(sqlx::query_as::<_, Book>(&sql).fetch_all(&self.pool).await?)
    }

    async fn get_book(&self, id: Uuid) -> StoreResult<Option<Book>> {
        let sql = format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS);
        Ok(sqlx::query_as::<_, Book>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_book(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
