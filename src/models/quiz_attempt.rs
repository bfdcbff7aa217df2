// src/models/quiz_attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

/// Graded answer for a single question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub question: String,
    /// `None` when the learner left the question unanswered.
    pub user_answer: Option<Value>,
    pub correct: bool,
}

/// Represents the 'quiz_attempts' table.
/// Only the latest attempt per (user, course, module) is kept.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub module_index: i32,
    pub answers: Json<Vec<AnswerResult>>,
    pub correct_count: i32,
    pub total_questions: i32,
    /// Percentage 0-100.
    pub score: i32,
    pub submitted_at: DateTime<Utc>,
}

/// DTO for submitting a module quiz.
///
/// `answers[i]` is matched against question `i`; missing or `null`
/// entries count as wrong.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    pub answers: Vec<Value>,
}
