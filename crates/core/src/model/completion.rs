use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::grading::QuizGrade;
use crate::model::ids::{AssessmentId, CourseId, ResourceId, UserId};
use crate::model::wire::{flag, option_timestamp};

/// Completion record for one resource, per learner and course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleProgress {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(alias = "user_id")]
    pub user_id: UserId,
    #[serde(alias = "course_id")]
    pub course_id: CourseId,
    #[serde(alias = "resource_id")]
    pub resource_id: ResourceId,
    #[serde(default, deserialize_with = "flag::deserialize")]
    pub completed: bool,
    #[serde(default, alias = "completed_at", with = "option_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updated_at", with = "option_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ModuleProgress {
    /// A completed record stamped at `at`.
    #[must_use]
    pub fn completed(
        user_id: UserId,
        course_id: CourseId,
        resource_id: ResourceId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            user_id,
            course_id,
            resource_id,
            completed: true,
            completed_at: Some(at),
            updated_at: Some(at),
        }
    }

    /// Most recent moment this record is known to have changed.
    #[must_use]
    pub fn last_touched(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.completed_at)
    }
}

/// One scored attempt at an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentProgress {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(alias = "user_id")]
    pub user_id: UserId,
    #[serde(alias = "course_id")]
    pub course_id: CourseId,
    #[serde(alias = "assessment_id")]
    pub assessment_id: AssessmentId,
    #[serde(default)]
    pub score: u32,
    #[serde(default, alias = "max_score")]
    pub max_score: u32,
    #[serde(default)]
    pub percentage: f64,
    #[serde(default, deserialize_with = "flag::deserialize")]
    pub passed: bool,
    #[serde(default = "first_attempt", alias = "attempt_number")]
    pub attempt_number: u32,
    #[serde(default, alias = "completed_at", with = "option_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
}

fn first_attempt() -> u32 {
    1
}

impl AssessmentProgress {
    /// Build the record for a graded attempt.
    ///
    /// `completed_at` is only set when the attempt passed.
    #[must_use]
    pub fn from_grade(
        user_id: UserId,
        course_id: CourseId,
        assessment_id: AssessmentId,
        grade: &QuizGrade,
        attempt_number: u32,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            user_id,
            course_id,
            assessment_id,
            score: grade.score,
            max_score: grade.max_score,
            percentage: grade.percentage,
            passed: grade.passed,
            attempt_number,
            completed_at: grade.passed.then_some(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn module_progress_reads_snake_case_payload() {
        let json = r#"{
            "id": 11, "user_id": 1, "course_id": 2, "resource_id": 3,
            "completed": "true", "completed_at": "2024-01-02T03:04:05"
        }"#;
        let parsed: ModuleProgress = serde_json::from_str(json).unwrap();
        assert!(parsed.completed);
        assert_eq!(parsed.resource_id, ResourceId::new(3));
        assert!(parsed.completed_at.is_some());
        assert_eq!(parsed.last_touched(), parsed.completed_at);
    }

    #[test]
    fn assessment_progress_defaults_attempt_to_one() {
        let json = r#"{"userId":1,"courseId":2,"assessmentId":3,"score":4,"maxScore":5,"percentage":80.0,"passed":true}"#;
        let parsed: AssessmentProgress = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.attempt_number, 1);
        assert!(parsed.passed);
        assert_eq!(parsed.completed_at, None);
    }

    #[test]
    fn failed_grade_has_no_completion_time() {
        let grade = QuizGrade {
            score: 1,
            max_score: 5,
            percentage: 20.0,
            passed: false,
        };
        let record = AssessmentProgress::from_grade(
            UserId::new(1),
            CourseId::new(2),
            AssessmentId::new(3),
            &grade,
            2,
            fixed_now(),
        );
        assert_eq!(record.attempt_number, 2);
        assert_eq!(record.completed_at, None);
    }
}
