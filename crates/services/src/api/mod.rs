//! Transport seam between services and the LMS REST API.

use async_trait::async_trait;
use lms_core::model::{
    Announcement, Assessment, AssessmentProgress, Course, CourseId, Enrollment, EnrollmentId,
    ModuleProgress, Notification, NotificationId, Resource, UserId,
};

use crate::error::ApiError;

mod envelope;
mod http;

pub use envelope::decode_list;
pub use http::HttpLmsApi;

/// Operations the client needs from the LMS backend.
///
/// Implementations own transport details; callers only see domain types.
#[async_trait]
pub trait LmsApi: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or an undecodable body.
    async fn list_courses(&self) -> Result<Vec<Course>, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError::NotFound` for an unknown course.
    async fn get_course(&self, course_id: CourseId) -> Result<Course, ApiError>;

    /// Lectures of a course in playlist order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or an undecodable body.
    async fn list_resources(&self, course_id: CourseId) -> Result<Vec<Resource>, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or an undecodable body.
    async fn list_assessments(&self, course_id: CourseId) -> Result<Vec<Assessment>, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or an undecodable body.
    async fn list_module_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ModuleProgress>, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` if the server rejects the record.
    async fn record_module_progress(&self, record: &ModuleProgress) -> Result<(), ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or an undecodable body.
    async fn list_assessment_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<AssessmentProgress>, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` if the server rejects the attempt.
    async fn submit_assessment_progress(
        &self,
        attempt: &AssessmentProgress,
    ) -> Result<(), ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or an undecodable body.
    async fn list_enrollments(&self, user_id: UserId) -> Result<Vec<Enrollment>, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` if the server rejects the enrollment.
    async fn enroll(&self, user_id: UserId, course_id: CourseId) -> Result<Enrollment, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` if the enrollment cannot be removed.
    async fn unenroll(&self, enrollment_id: EnrollmentId) -> Result<(), ApiError>;

    /// Remove every module-progress record of a learner in a course.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the server rejects the delete.
    async fn delete_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or an undecodable body.
    async fn list_announcements(
        &self,
        course_ids: &[CourseId],
    ) -> Result<Vec<Announcement>, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or an undecodable body.
    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` if the server does not confirm the update.
    async fn mark_notification_read(&self, id: NotificationId) -> Result<(), ApiError>;
}
