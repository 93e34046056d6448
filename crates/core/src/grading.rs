use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::Question;

/// Minimum percentage that passes a quiz. Inclusive.
pub const PASS_THRESHOLD_PERCENT: f64 = 70.0;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GradingError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("{} question(s) unanswered", missing.len())]
    Unanswered { missing: Vec<usize> },
}

//
// ─── GRADE ────────────────────────────────────────────────────────────────────
//

/// Outcome of grading one quiz submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuizGrade {
    pub score: u32,
    pub max_score: u32,
    pub percentage: f64,
    pub passed: bool,
}

/// Grade `answers` (question index → selected option) against `questions`.
///
/// Every question must be answered. Selections match only when they are
/// byte-for-byte equal to the stored answer. Answers for indices past the
/// last question are ignored.
///
/// # Errors
///
/// - `GradingError::NoQuestions` for an empty quiz.
/// - `GradingError::Unanswered` listing every missing index, ascending.
#[allow(clippy::cast_possible_truncation)]
pub fn grade_quiz(
    questions: &[Question],
    answers: &BTreeMap<usize, String>,
) -> Result<QuizGrade, GradingError> {
    if questions.is_empty() {
        return Err(GradingError::NoQuestions);
    }

    let missing: Vec<usize> = (0..questions.len())
        .filter(|idx| !answers.contains_key(idx))
        .collect();
    if !missing.is_empty() {
        return Err(GradingError::Unanswered { missing });
    }

    let score = questions
        .iter()
        .enumerate()
        .filter(|(idx, question)| {
            answers
                .get(idx)
                .is_some_and(|selected| question.is_correct(selected))
        })
        .count() as u32;
    let max_score = questions.len() as u32;
    let percentage = f64::from(score) / f64::from(max_score) * 100.0;

    Ok(QuizGrade {
        score,
        max_score,
        percentage,
        passed: percentage >= PASS_THRESHOLD_PERCENT,
    })
}
