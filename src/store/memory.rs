// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
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

type AttemptKey = (Uuid, Uuid, i32);
type ProgressKey = (Uuid, Uuid);

#[derive(Default)]
struct Collections {
    users: HashMap<Uuid, User>,
    courses: HashMap<Uuid, Course>,
    /// (course, user, module)
    accesses: HashMap<AttemptKey, QuizAccess>,
    /// (user, course, module)
    attempts: HashMap<AttemptKey, QuizAttempt>,
    /// (course, user)
    progress: HashMap<ProgressKey, UserCourseProgress>,
    certificates: HashMap<Uuid, Certificate>,
    messages: Vec<Message>,
    books: HashMap<Uuid, Book>,
}

/// Process-local store. Every operation holds one lock, so each call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut db = self.inner.lock().await;
        if db.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!(
                "Email '{}' is already registered",
                user.email
            )));
        }
        db.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let db = self.inner.lock().await;
        Ok(db.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let users = self.inner.lock().await.users.values().cloned().collect();
        Ok(newest_first(users, |u: &User| u.created_at))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut db = self.inner.lock().await;
        if db.users.remove(&id).is_none() {
            return Ok(false);
        }
        db.accesses.retain(|(_, user, _), _| *user != id);
        db.attempts.retain(|(user, _, _), _| *user != id);
        db.progress.retain(|(_, user), _| *user != id);
        Ok(true)
    }

    async fn set_user_approved(&self, id: Uuid, approved: bool) -> StoreResult<bool> {
        let mut db = self.inner.lock().await;
        match db.users.get_mut(&id) {
            Some(user) => {
                user.approved = approved;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        email: Option<&str>,
        profile_image_url: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let mut db = self.inner.lock().await;

        if let Some(email) = email {
            if db.users.values().any(|u| u.email == email && u.id != id) {
                return Err(StoreError::Duplicate(format!(
                    "Email '{}' is already in use",
                    email
                )));
            }
        }

        let Some(user) = db.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = email {
            user.email = email.to_string();
        }
        if let Some(url) = profile_image_url {
            user.profile_image_url = Some(url.to_string());
        }
        Ok(Some(user.clone()))
    }

    async fn insert_course(&self, course: &Course) -> StoreResult<()> {
        self.inner
            .lock()
            .await
            .courses
            .insert(course.id, course.clone());
        Ok(())
    }

    async fn update_course(&self, course: &Course) -> StoreResult<bool> {
        let mut db = self.inner.lock().await;
        match db.courses.get_mut(&course.id) {
            Some(existing) => {
                *existing = course.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_course(&self, id: Uuid) -> StoreResult<Option<Course>> {
        Ok(self.inner.lock().await.courses.get(&id).cloned())
    }

    async fn list_courses(&self) -> StoreResult<Vec<Course>> {
        let courses = self.inner.lock().await.courses.values().cloned().collect();
        Ok(newest_first(courses, |c: &Course| c.created_at))
    }

    async fn list_published_courses(&self, audience: Audience) -> StoreResult<Vec<Course>> {
        let courses = self
            .inner
            .lock()
            .await
            .courses
            .values()
            .filter(|c| c.status == CourseStatus::Published && c.audience == audience)
            .cloned()
            .collect();
        Ok(newest_first(courses, |c: &Course| c.created_at))
    }

    async fn set_course_status(&self, id: Uuid, status: CourseStatus) -> StoreResult<bool> {
        let mut db = self.inner.lock().await;
        match db.courses.get_mut(&id) {
            Some(course) => {
                course.status = status;
                course.updated_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_course(&self, id: Uuid) -> StoreResult<bool> {
        let mut db = self.inner.lock().await;
        if db.courses.remove(&id).is_none() {
            return Ok(false);
        }
        db.accesses.retain(|(course, _, _), _| *course != id);
        db.attempts.retain(|(_, course, _), _| *course != id);
        db.progress.retain(|(course, _), _| *course != id);
        Ok(true)
    }

    async fn record_quiz_access(&self, access: &QuizAccess) -> StoreResult<bool> {
        let mut db = self.inner.lock().await;
        let key = (access.course_id, access.user_id, access.module_index);
        if db.accesses.contains_key(&key) {
            return Ok(false);
        }
        db.accesses.insert(key, access.clone());
        Ok(true)
    }

    async fn count_quiz_accesses(&self, course_id: Uuid) -> StoreResult<i64> {
        let db = self.inner.lock().await;
        Ok(db.accesses.keys().filter(|(c, _, _)| *c == course_id).count() as i64)
    }

    async fn upsert_attempt(&self, attempt: &QuizAttempt) -> StoreResult<QuizAttempt> {
        let mut db = self.inner.lock().await;
        let key = (attempt.user_id, attempt.course_id, attempt.module_index);

        let mut stored = attempt.clone();
        if let Some(previous) = db.attempts.get(&key) {
            stored.id = previous.id;
        }
        db.attempts.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get_attempt(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        module_index: i32,
    ) -> StoreResult<Option<QuizAttempt>> {
        let db = self.inner.lock().await;
        Ok(db.attempts.get(&(user_id, course_id, module_index)).cloned())
    }

    async fn list_attempts(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<Vec<QuizAttempt>> {
        let db = self.inner.lock().await;
        let mut attempts: Vec<QuizAttempt> = db
            .attempts
            .values()
            .filter(|a| a.user_id == user_id && a.course_id == course_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.module_index);
        Ok(attempts)
    }

    async fn list_course_attempts(&self, course_id: Uuid) -> StoreResult<Vec<QuizAttempt>> {
        let db = self.inner.lock().await;
        let attempts = db
            .attempts
            .values()
            .filter(|a| a.course_id == course_id)
            .cloned()
            .collect();
        Ok(newest_first(attempts, |a: &QuizAttempt| a.submitted_at))
    }

    async fn get_progress(
        &self,
        course_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<UserCourseProgress>> {
        let db = self.inner.lock().await;
        Ok(db.progress.get(&(course_id, user_id)).cloned())
    }

    async fn list_course_progress(&self, course_id: Uuid) -> StoreResult<Vec<UserCourseProgress>> {
        let db = self.inner.lock().await;
        let mut rows: Vec<UserCourseProgress> = db
            .progress
            .values()
            .filter(|p| p.course_id == course_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.enrolled_at);
        Ok(rows)
    }

    async fn list_user_progress(&self, user_id: Uuid) -> StoreResult<Vec<UserCourseProgress>> {
        let db = self.inner.lock().await;
        let rows = db
            .progress
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |p: &UserCourseProgress| p.enrolled_at))
    }

    async fn delete_progress(&self, course_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut db = self.inner.lock().await;
        Ok(db.progress.remove(&(course_id, user_id)).is_some())
    }

    async fn reconcile_progress(
        &self,
        course_id: Uuid,
        user_id: Uuid,
        pass_threshold: i32,
    ) -> StoreResult<UserCourseProgress> {
        let mut db = self.inner.lock().await;

        let course = db
            .courses
            .get(&course_id)
            .ok_or(StoreError::NotFound("Course"))?;
        if !db.users.contains_key(&user_id) {
            return Err(StoreError::NotFound("User"));
        }

        let attempts: Vec<QuizAttempt> = db
            .attempts
            .values()
            .filter(|a| a.user_id == user_id && a.course_id == course_id)
            .cloned()
            .collect();
        let snapshot = compute_progress(course, &attempts, pass_threshold);

        let now = Utc::now();
        let row = db
            .progress
            .entry((course_id, user_id))
            .or_insert_with(|| UserCourseProgress::enrolled(course_id, user_id, now));
        row.apply(snapshot, now);
        Ok(row.clone())
    }

    async fn get_certificate(&self, id: Uuid) -> StoreResult<Option<Certificate>> {
        Ok(self.inner.lock().await.certificates.get(&id).cloned())
    }

    async fn find_certificate(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Option<Certificate>> {
        let db = self.inner.lock().await;
        Ok(db
            .certificates
            .values()
            .find(|c| c.user_id == user_id && c.course_id == course_id)
            .cloned())
    }

    async fn list_user_certificates(&self, user_id: Uuid) -> StoreResult<Vec<Certificate>> {
        let db = self.inner.lock().await;
        let certificates = db
            .certificates
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(certificates, |c: &Certificate| c.issued_at))
    }

    async fn insert_certificate_if_absent(
        &self,
        certificate: &Certificate,
    ) -> StoreResult<Certificate> {
        let mut db = self.inner.lock().await;
        if let Some(existing) = db
            .certificates
            .values()
            .find(|c| c.user_id == certificate.user_id && c.course_id == certificate.course_id)
        {
            return Ok(existing.clone());
        }
        if db.certificates.values().any(|c| c.code == certificate.code) {
            return Err(StoreError::Duplicate(format!(
                "Certificate code '{}'",
                certificate.code
            )));
        }
        db.certificates.insert(certificate.id, certificate.clone());
        Ok(certificate.clone())
    }

    async fn rename_certificate_holder(&self, id: Uuid, user_name: &str) -> StoreResult<()> {
        let mut db = self.inner.lock().await;
        if let Some(certificate) = db.certificates.get_mut(&id) {
            certificate.user_name = user_name.to_string();
        }
        Ok(())
    }

    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        self.inner.lock().await.messages.push(message.clone());
        Ok(())
    }

    async fn inbox(&self, email: &str) -> StoreResult<Vec<Message>> {
        let db = self.inner.lock().await;
        let messages = db
            .messages
            .iter()
            .filter(|m| m.to_email == email)
            .cloned()
            .collect();
        Ok(newest_first(messages, |m: &Message| m.sent_at))
    }

    async fn insert_book(&self, book: &Book) -> StoreResult<()> {
        self.inner.lock().await.books.insert(book.id, book.clone());
        Ok(())
    }

    async fn list_books(&self) -> StoreResult<Vec<Book>> {
        let books = self.inner.lock().await.books.values().cloned().collect();
        Ok(newest_first(books, |b: &Book| b.created_at))
    }

    async fn get_book(&self, id: Uuid) -> StoreResult<Option<Book>> {
        Ok(self.inner.lock().await.books.get(&id).cloned())
    }

    async fn delete_book(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.lock().await.books.remove(&id).is_some())
    }
}
