use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Course, CourseId, UserId};
use crate::progress::CourseProgress;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CertificateError {
    #[error("course not complete: {completed} of {total} items done")]
    NotEligible { completed: usize, total: usize },
}

//
// ─── GATE ─────────────────────────────────────────────────────────────────────
//

/// Whether the learner has finished every item of a non-empty course.
///
/// Compares item counts rather than the percentage so a float that lands a
/// hair under 100 cannot block the certificate.
#[must_use]
pub fn is_eligible_for_certificate(progress: &CourseProgress) -> bool {
    progress.total_items > 0 && progress.completed_items >= progress.total_items
}

//
// ─── CERTIFICATE ──────────────────────────────────────────────────────────────
//

/// Completion certificate for one learner and one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub number: Uuid,
    pub course_id: CourseId,
    pub course_title: String,
    pub instructor_name: Option<String>,
    pub learner_id: UserId,
    pub learner_name: String,
    pub issued_at: DateTime<Utc>,
}

impl Certificate {
    /// Issue a certificate if `progress` passes the gate.
    ///
    /// # Errors
    ///
    /// Returns `CertificateError::NotEligible` when items remain.
    pub fn issue(
        course: &Course,
        learner_id: UserId,
        learner_name: impl Into<String>,
        progress: &CourseProgress,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, CertificateError> {
        if !is_eligible_for_certificate(progress) {
            return Err(CertificateError::NotEligible {
                completed: progress.completed_items,
                total: progress.total_items,
            });
        }

        Ok(Self {
            number: Uuid::new_v4(),
            course_id: course.id,
            course_title: course.title.clone(),
            instructor_name: course.instructor_name.clone(),
            learner_id,
            learner_name: learner_name.into(),
            issued_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn course() -> Course {
        Course {
            id: CourseId::new(3),
            title: "Systems Programming".into(),
            description: String::new(),
            instructor_id: Some(UserId::new(50)),
            instructor_name: Some("Ada".into()),
            price: None,
            image: None,
            rating: None,
        }
    }

    #[test]
    fn eligible_only_when_all_items_done() {
        assert!(is_eligible_for_certificate(&CourseProgress::from_counts(5, 5)));
        assert!(!is_eligible_for_certificate(&CourseProgress::from_counts(3, 5)));
        assert!(!is_eligible_for_certificate(&CourseProgress::from_counts(4, 5)));
    }

    #[test]
    fn empty_course_is_never_eligible() {
        assert!(!is_eligible_for_certificate(&CourseProgress::empty()));
    }

    #[test]
    fn gate_uses_counts_not_percentage() {
        let progress = CourseProgress {
            percentage: 99.999_999,
            completed_items: 3,
            total_items: 3,
        };
        assert!(is_eligible_for_certificate(&progress));
    }

    #[test]
    fn issue_requires_eligibility() {
        let err = Certificate::issue(
            &course(),
            UserId::new(1),
            "Grace",
            &CourseProgress::from_counts(3, 5),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, CertificateError::NotEligible { completed: 3, total: 5 });
    }

    #[test]
    fn issue_copies_course_details() {
        let cert = Certificate::issue(
            &course(),
            UserId::new(1),
            "Grace",
            &CourseProgress::from_counts(5, 5),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(cert.course_title, "Systems Programming");
        assert_eq!(cert.instructor_name.as_deref(), Some("Ada"));
        assert_eq!(cert.learner_name, "Grace");
        assert_eq!(cert.issued_at, fixed_now());
    }
}
