use std::collections::HashSet;
use std::sync::Mutex;

use lms_core::model::{Course, CourseId, User};
use lms_core::{Certificate, Clock, CourseProgress, is_eligible_for_certificate};
use tracing::info;

use crate::error::ProgressError;

/// Emitted the first time a course's progress passes the completion gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionEvent {
    NewlyEligible { course_id: CourseId },
}

/// Edge-triggers the completion gate once per course for the lifetime of
/// the tracker.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    clock: Clock,
    announced: Mutex<HashSet<CourseId>>,
}

impl CompletionTracker {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            announced: Mutex::new(HashSet::new()),
        }
    }

    /// Feed the latest progress for `course_id`.
    ///
    /// Returns an event only on the first observation that passes the gate.
    pub fn observe(&self, course_id: CourseId, progress: &CourseProgress) -> Option<CompletionEvent> {
        if !is_eligible_for_certificate(progress) {
            return None;
        }
        let mut announced = self
            .announced
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !announced.insert(course_id) {
            return None;
        }
        info!(%course_id, "course completed");
        Some(CompletionEvent::NewlyEligible { course_id })
    }

    /// Issue a certificate stamped with the tracker's clock.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Certificate` if the course is not complete.
    pub fn certificate(
        &self,
        course: &Course,
        learner: &User,
        progress: &CourseProgress,
    ) -> Result<Certificate, ProgressError> {
        Ok(Certificate::issue(
            course,
            learner.id,
            learner.display_name(),
            progress,
            self.clock.now(),
        )?)
    }
}
