use std::collections::HashSet;
use std::sync::Arc;

use lms_core::model::{CourseId, Enrollment, UserId};
use storage::repository::ProgressCache;
use tracing::{info, warn};

use crate::api::LmsApi;
use crate::error::EnrollmentError;

#[derive(Clone)]
pub struct EnrollmentService {
    api: Arc<dyn LmsApi>,
    progress: Arc<dyn ProgressCache>,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(api: Arc<dyn LmsApi>, progress: Arc<dyn ProgressCache>) -> Self {
        Self { api, progress }
    }

    /// Active enrollments of `user_id`.
    ///
    /// The list endpoint may return other learners' rows, so results are
    /// filtered by student id.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::Api` if the fetch fails.
    pub async fn enrollments(&self, user_id: UserId) -> Result<Vec<Enrollment>, EnrollmentError> {
        let mut enrollments = self.api.list_enrollments(user_id).await?;
        enrollments.retain(|e| e.student_id == user_id && e.status.is_active());
        Ok(enrollments)
    }

    /// # Errors
    ///
    /// Returns `EnrollmentError::Api` if the fetch fails.
    pub async fn enrolled_course_ids(
        &self,
        user_id: UserId,
    ) -> Result<HashSet<CourseId>, EnrollmentError> {
        Ok(self
            .enrollments(user_id)
            .await?
            .into_iter()
            .map(|e| e.course_id)
            .collect())
    }

    /// Enroll in a course. An existing active enrollment is returned as is.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::Api` if the server rejects the enrollment.
    pub async fn enroll(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, EnrollmentError> {
        if let Some(existing) = self
            .enrollments(user_id)
            .await?
            .into_iter()
            .find(|e| e.course_id == course_id)
        {
            return Ok(existing);
        }
        let enrollment = self.api.enroll(user_id, course_id).await?;
        info!(%user_id, %course_id, "enrolled");
        Ok(enrollment)
    }

    /// Drop a course and remove the learner's progress for it, remotely and
    /// from the local cache.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::NotEnrolled` if no active enrollment exists,
    /// or an API/storage error if removal fails.
    pub async fn unenroll(&self, user_id: UserId, course_id: CourseId) -> Result<(), EnrollmentError> {
        let enrollment = self
            .enrollments(user_id)
            .await?
            .into_iter()
            .find(|e| e.course_id == course_id)
            .ok_or(EnrollmentError::NotEnrolled(course_id))?;
        let enrollment_id = enrollment.id.ok_or(EnrollmentError::MissingId(course_id))?;

        self.api.unenroll(enrollment_id).await?;
        if let Err(err) = self.api.delete_course_progress(user_id, course_id).await {
            warn!(%user_id, %course_id, error = %err, "server progress not removed");
        }
        self.progress.purge_course(user_id, course_id).await?;
        info!(%user_id, %course_id, "unenrolled");
        Ok(())
    }
}
