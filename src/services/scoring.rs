// src/services/scoring.rs

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        course::QuizQuestion,
        progress::UserCourseProgress,
        quiz_attempt::{AnswerResult, QuizAttempt},
    },
    services::progress::percentage,
    store::Store,
};

/// Graded quiz, before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCard {
    pub results: Vec<AnswerResult>,
    pub correct_count: usize,
    pub total_questions: usize,
    pub score: i32,
}

/// Grades `answers` against `quiz` position by position.
///
/// Strict value equality; missing or `null` answers are wrong.
pub fn score_answers(quiz: &[QuizQuestion], answers: &[Value]) -> ScoreCard {
    let results: Vec<AnswerResult> = quiz
        .iter()
        .enumerate()
        .map(|(i, question)| {
            let user_answer = answers.get(i).filter(|a| !a.is_null()).cloned();
            let correct = user_answer
                .as_ref()
                .is_some_and(|answer| *answer == question.correct_answer);
            AnswerResult {
                question: question.question.clone(),
                user_answer,
                correct,
            }
        })
        .collect();

    let correct_count = results.iter().filter(|r| r.correct).count();
    let total_questions = quiz.len();

    ScoreCard {
        results,
        correct_count,
        total_questions,
        score: percentage(correct_count, total_questions),
    }
}

/// Stored attempt plus the progress it produced.
#[derive(Debug, Clone)]
pub struct Submission {
    pub attempt: QuizAttempt,
    pub progress: UserCourseProgress,
    pub passed: bool,
}

/// Grades a module quiz, stores the attempt and reconciles course progress.
pub async fn submit_quiz(
    store: &dyn Store,
    user_id: Uuid,
    course_id: Uuid,
    module_index: i32,
    answers: &[Value],
    pass_threshold: i32,
) -> Result<Submission, AppError> {
    let course = store
        .get_course(course_id)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    let module = course
        .module(module_index)
        .ok_or(AppError::NotFound("Module not found".to_string()))?;

    if !module.has_quiz() {
        return Err(AppError::BadRequest(
            "This module has no quiz".to_string(),
        ));
    }

    let card = score_answers(&module.quiz, answers);

    let attempt = store
        .upsert_attempt(&QuizAttempt {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            module_index,
            answers: sqlx::types::Json(card.results),
            correct_count: card.correct_count as i32,
            total_questions: card.total_questions as i32,
            score: card.score,
            submitted_at: Utc::now(),
        })
        .await?;

    let progress = store
        .reconcile_progress(course_id, user_id, pass_threshold)
        .await?;

    tracing::info!(
        %user_id,
        %course_id,
        module_index,
        score = attempt.score,
        progress = progress.progress,
        "Quiz submitted"
    );

    Ok(Submission {
        passed: attempt.score >= pass_threshold,
        attempt,
        progress,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quiz(keys: &[Value]) -> Vec<QuizQuestion> {
        keys.iter()
            .enumerate()
            .map(|(i, key)| QuizQuestion {
                question: format!("Question {}", i),
                options: vec![],
                correct_answer: key.clone(),
            })
            .collect()
    }

    #[test]
    fn test_score_perfect() {
        let q = quiz(&[json!("A"), json!("B")]);
        let card = score_answers(&q, &[json!("A"), json!("B")]);
        assert_eq!(card.correct_count, 2);
        assert_eq!(card.score, 100);
    }

    #[test]
    fn test_score_half() {
        let q = quiz(&[json!("A"), json!("B")]);
        let card = score_answers(&q, &[json!("A"), json!("C")]);
        assert_eq!(card.correct_count, 1);
        assert_eq!(card.score, 50);
        assert!(!card.results[1].correct);
    }

    #[test]
    fn test_missing_answers_are_wrong() {
        let q = quiz(&[json!("A"), json!("B"), json!("C")]);
        let card = score_answers(&q, &[json!("A")]);
        assert_eq!(card.correct_count, 1);
        assert_eq!(card.total_questions, 3);
        assert_eq!(card.score, 33);
        assert_eq!(card.results[2].user_answer, None);
    }

    #[test]
    fn test_null_never_matches() {
        let q = quiz(&[json!("A")]);
        let card = score_answers(&q, &[Value::Null]);
        assert_eq!(card.correct_count, 0);
        assert_eq!(card.results[0].user_answer, None);
    }

    #[test]
    fn test_equality_is_strict() {
        let q = quiz(&[json!(1), json!("a")]);
        let card = score_answers(&q, &[json!("1"), json!("A")]);
        assert_eq!(card.correct_count, 0);
    }

    #[test]
    fn test_extra_answers_are_ignored() {
        let q = quiz(&[json!(2)]);
        let card = score_answers(&q, &[json!(2), json!(3), json!(4)]);
        assert_eq!(card.results.len(), 1);
        assert_eq!(card.score, 100);
    }

    #[test]
    fn test_pass_threshold_boundary() {
        // 10 questions, 7 right is exactly 70%.
        let keys: Vec<Value> = (0..10).map(|_| json!("A")).collect();
        let q = quiz(&keys);

        let mut answers: Vec<Value> = (0..7).map(|_| json!("A")).collect();
        answers.extend((0..3).map(|_| json!("B")));
        assert_eq!(score_answers(&q, &answers).score, 70);
    }
}
