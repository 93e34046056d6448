use serde::{Deserialize, Serialize};

use crate::model::ids::{AssessmentId, CourseId};

/// A multiple-choice question with one stored answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub answer: String,
}

impl Question {
    /// Exact, case-sensitive comparison. Stored answers are not normalized,
    /// so neither is the selection.
    #[must_use]
    pub fn is_correct(&self, selected: &str) -> bool {
        selected == self.answer
    }

    /// Whether the stored answer is one of the offered options.
    ///
    /// A `false` here means no selection can ever be graded correct.
    #[must_use]
    pub fn answer_is_offered(&self) -> bool {
        self.options.iter().any(|opt| opt == &self.answer)
    }
}

/// A quiz attached to a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: AssessmentId,
    #[serde(default, alias = "course_id")]
    pub course_id: Option<CourseId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Assessment {
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Indices of questions whose stored answer is not among their options.
    #[must_use]
    pub fn unanswerable_questions(&self) -> Vec<usize> {
        self.questions
            .iter()
            .enumerate()
            .filter(|(_, question)| !question.answer_is_offered())
            .map(|(idx, _)| idx)
            .collect()
    }
}
