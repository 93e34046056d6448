use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, EnrollmentId, UserId};

/// Lifecycle state of an enrollment as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnrollmentStatus {
    #[default]
    Enrolled,
    Completed,
    Dropped,
    /// Any status this client does not know, kept verbatim.
    Other(String),
}

impl EnrollmentStatus {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Enrolled => "enrolled",
            Self::Completed => "completed",
            Self::Dropped => "dropped",
            Self::Other(raw) => raw,
        }
    }

    /// Dropped enrollments no longer grant access to course content.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Dropped)
    }
}

impl From<String> for EnrollmentStatus {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "enrolled" | "active" => Self::Enrolled,
            "completed" => Self::Completed,
            "dropped" | "cancelled" => Self::Dropped,
            _ => Self::Other(raw),
        }
    }
}

impl From<EnrollmentStatus> for String {
    fn from(status: EnrollmentStatus) -> Self {
        status.as_str().to_owned()
    }
}

/// Links a learner to a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    #[serde(default)]
    pub id: Option<EnrollmentId>,
    #[serde(alias = "userId")]
    pub student_id: UserId,
    pub course_id: CourseId,
    #[serde(default)]
    pub status: EnrollmentStatus,
}

impl Enrollment {
    /// A not-yet-persisted enrollment for `student` in `course`.
    #[must_use]
    pub fn new(student_id: UserId, course_id: CourseId) -> Self {
        Self {
            id: None,
            student_id,
            course_id,
            status: EnrollmentStatus::Enrolled,
        }
    }
}
