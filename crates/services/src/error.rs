//! Shared error types for the services crate.

use thiserror::Error;

use lms_core::model::{AssessmentId, CourseId};
use lms_core::{CertificateError, GradingError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `LmsApi` implementations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("request failed with status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while reading client configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{var} must be a positive whole number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Errors emitted by `ProgressService` and `CompletionTracker`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("assessment {assessment_id} not found in course {course_id}")]
    UnknownAssessment {
        course_id: CourseId,
        assessment_id: AssessmentId,
    },
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the announcement and notification services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InboxError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `EnrollmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnrollmentError {
    #[error("not enrolled in course {0}")]
    NotEnrolled(CourseId),
    #[error("enrollment for course {0} has no server id")]
    MissingId(CourseId),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Inbox(#[from] InboxError),
}
