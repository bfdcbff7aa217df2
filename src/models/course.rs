// src/models/course.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, types::Json};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use super::validate_url_string;

/// Who a course is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Teacher,
    Student,
    Community,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseStatus {
    Pending,
    Published,
}

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Teacher => "teacher",
            Audience::Student => "student",
            Audience::Community => "community",
        }
    }
}

impl FromStr for Audience {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teacher" => Ok(Audience::Teacher),
            "student" => Ok(Audience::Student),
            "community" => Ok(Audience::Community),
            _ => Err(ParseEnumError {
                kind: "audience",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Audience {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Pending => "pending",
            CourseStatus::Published => "published",
        }
    }
}

impl TryFrom<String> for CourseStatus {
    type Error = ParseEnumError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(CourseStatus::Pending),
            "published" => Ok(CourseStatus::Published),
            _ => Err(ParseEnumError {
                kind: "course status",
                value,
            }),
        }
    }
}

/// A named external link attached to a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ModuleLink {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub url: String,
}

/// A stored file (course material or module attachment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MediaFile {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub url: String,
    #[serde(default)]
    pub public_id: Option<String>,
}

/// One quiz question. Answers are compared to `correct_answer` by exact value equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct QuizQuestion {
    #[validate(length(min = 1, max = 1000))]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[validate(custom(function = validate_answer_key))]
    pub correct_answer: Value,
}

/// Question as shown to learners (answer key stripped).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Module {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 20000))]
    pub description: String,
    #[serde(default)]
    #[validate(nested)]
    pub links: Vec<ModuleLink>,
    #[serde(default)]
    #[validate(nested)]
    pub quiz: Vec<QuizQuestion>,
    #[serde(default)]
    #[validate(nested)]
    pub files: Vec<MediaFile>,
}

impl Module {
    /// Only modules with at least one question count toward progress.
    pub fn has_quiz(&self) -> bool {
        !self.quiz.is_empty()
    }
}

/// Module as shown to learners.
#[derive(Debug, Clone, Serialize)]
pub struct PublicModule {
    pub title: String,
    pub description: String,
    pub links: Vec<ModuleLink>,
    pub quiz: Vec<PublicQuestion>,
    pub files: Vec<MediaFile>,
}

impl From<&Module> for PublicModule {
    fn from(module: &Module) -> Self {
        Self {
            title: module.title.clone(),
            description: module.description.clone(),
            links: module.links.clone(),
            quiz: module
                .quiz
                .iter()
                .map(|q| PublicQuestion {
                    question: q.question.clone(),
                    options: q.options.clone(),
                })
                .collect(),
            files: module.files.clone(),
        }
    }
}

/// Represents the 'courses' table. Document-shaped parts live in JSONB columns.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub image_url: String,
    pub image_public_id: Option<String>,
    pub tools: Json<Vec<String>>,
    pub learning_outcomes: Json<Vec<String>>,
    pub duration_hours: i32,
    pub welcome: String,
    pub modules: Json<Vec<Module>>,
    pub module_files: Json<Vec<MediaFile>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[sqlx(try_from = "String")]
    pub audience: Audience,
    #[sqlx(try_from = "String")]
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Course {
    pub fn module(&self, index: i32) -> Option<&Module> {
        usize::try_from(index).ok().and_then(|i| self.modules.get(i))
    }

    pub fn quiz_module_count(&self) -> usize {
        self.modules.iter().filter(|m| m.has_quiz()).count()
    }
}

/// Course as returned by the public endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CourseResponse {
    pub id: Uuid,
    pub title: String,
    pub image_url: String,
    pub tools: Vec<String>,
    pub learning_outcomes: Vec<String>,
    pub duration_hours: i32,
    pub welcome: String,
    pub modules: Vec<PublicModule>,
    pub module_files: Vec<MediaFile>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub audience: Audience,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub quiz_access_count: i64,
}

impl CourseResponse {
    pub fn new(course: &Course, quiz_access_count: i64) -> Self {
        Self {
            id: course.id,
            title: course.title.clone(),
            image_url: course.image_url.clone(),
            tools: course.tools.0.clone(),
            learning_outcomes: course.learning_outcomes.0.clone(),
            duration_hours: course.duration_hours,
            welcome: course.welcome.clone(),
            modules: course.modules.iter().map(PublicModule::from).collect(),
            module_files: course.module_files.0.clone(),
            start_date: course.start_date,
            end_date: course.end_date,
            audience: course.audience,
            status: course.status,
            created_at: course.created_at,
            updated_at: course.updated_at,
            quiz_access_count,
        }
    }
}

/// Marks that a user opened a module's quiz. One row per (course, user, module).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAccess {
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub module_index: i32,
    pub accessed_at: DateTime<Utc>,
}

/// Enrolled user as listed for course staff.
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub enrolled_at: DateTime<Utc>,
    pub progress: i32,
}

fn validate_answer_key(value: &Value) -> Result<(), validator::ValidationError> {
    if value.is_null() {
        return Err(validator::ValidationError::new("missing_correct_answer"));
    }
    Ok(())
}
