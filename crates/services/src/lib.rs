#![forbid(unsafe_code)]

pub mod announcement_service;
pub mod api;
pub mod app_services;
pub mod certificate;
pub mod config;
pub mod enrollment_service;
pub mod error;
pub mod notification_service;
pub mod poller;
pub mod progress_service;
pub mod session;

pub use lms_core::Clock;

pub use announcement_service::{AnnouncementFeed, AnnouncementService};
pub use api::{HttpLmsApi, LmsApi};
pub use app_services::{AppServices, InboxSnapshot};
pub use certificate::{CompletionEvent, CompletionTracker};
pub use config::ClientConfig;
pub use enrollment_service::EnrollmentService;
pub use error::{
    ApiError, AppServicesError, ConfigError, EnrollmentError, InboxError, ProgressError,
};
pub use notification_service::NotificationService;
pub use poller::Poller;
pub use progress_service::{
    CachedProgress, CourseView, DashboardEntry, ProgressRecords, ProgressService, ProgressSource,
    QuizSubmission,
};
pub use session::{Liveness, SessionState, SessionStore, ViewGuard};
