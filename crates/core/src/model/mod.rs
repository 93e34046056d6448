mod announcement;
mod assessment;
mod completion;
mod course;
mod enrollment;
mod ids;
mod notification;
mod user;
pub mod wire;

pub use announcement::Announcement;
pub use assessment::{Assessment, Question};
pub use completion::{AssessmentProgress, ModuleProgress};
pub use course::{Course, Resource};
pub use enrollment::{Enrollment, EnrollmentStatus};
pub use ids::{
    AnnouncementId, AssessmentId, CourseId, EnrollmentId, NotificationId, ParseIdError,
    ResourceId, UserId,
};
pub use notification::{Notification, NotificationKind};
pub use user::User;
