#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Duration;
use lms_core::model::{
    Announcement, AnnouncementId, Assessment, AssessmentId, AssessmentProgress, Course, CourseId,
    Enrollment, EnrollmentId, ModuleProgress, Notification, NotificationId, NotificationKind,
    Question, Resource, ResourceId, UserId,
};
use lms_core::time::fixed_now;
use services::{ApiError, LmsApi};

pub const LEARNER: UserId = UserId::new(1);

/// Scriptable in-process stand-in for the LMS backend.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

#[derive(Default)]
pub struct FakeState {
    pub courses: Vec<Course>,
    pub resources: HashMap<CourseId, Vec<Resource>>,
    pub assessments: HashMap<CourseId, Vec<Assessment>>,
    pub module_progress: Vec<ModuleProgress>,
    pub assessment_progress: Vec<AssessmentProgress>,
    pub enrollments: Vec<Enrollment>,
    pub announcements: Vec<Announcement>,
    pub notifications: Vec<Notification>,
    /// Every call fails.
    pub offline: bool,
    /// Only progress reads fail.
    pub progress_offline: bool,
    pub failing_reads: HashSet<NotificationId>,
    pub calls: Vec<String>,
    next_id: u64,
}

fn unavailable() -> ApiError {
    ApiError::HttpStatus {
        status: 503,
        body: "service unavailable".into(),
    }
}

impl FakeApi {
    pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn calls_to(&self, name: &str) -> usize {
        self.with(|s| s.calls.iter().filter(|c| c.as_str() == name).count())
    }

    fn enter(&self, name: &str) -> Result<(), ApiError> {
        self.with(|s| {
            s.calls.push(name.to_string());
            if s.offline { Err(unavailable()) } else { Ok(()) }
        })
    }

    /// A course with `resources` lectures and `assessments` two-question quizzes.
    pub fn seed_course(&self, id: u64, resources: u64, assessments: u64) -> CourseId {
        let course_id = CourseId::new(id);
        self.with(|s| {
            s.courses.push(course(course_id));
            s.resources.insert(
                course_id,
                (1..=resources)
                    .map(|n| Resource {
                        id: ResourceId::new(id * 100 + n),
                        course_id: Some(course_id),
                        title: format!("Lecture {n}"),
                        duration: Some("12 min".into()),
                        video_url: None,
                    })
                    .collect(),
            );
            s.assessments.insert(
                course_id,
                (1..=assessments)
                    .map(|n| Assessment {
                        id: AssessmentId::new(id * 1000 + n),
                        course_id: Some(course_id),
                        title: format!("Quiz {n}"),
                        description: String::new(),
                        questions: vec![question("2 + 2", "4"), question("3 * 3", "9")],
                    })
                    .collect(),
            );
        });
        course_id
    }

    pub fn enroll_learner(&self, course_id: CourseId) {
        self.with(|s| {
            s.next_id += 1;
            let mut enrollment = Enrollment::new(LEARNER, course_id);
            enrollment.id = Some(EnrollmentId::new(s.next_id));
            s.enrollments.push(enrollment);
        });
    }

    pub fn resource_ids(&self, course_id: CourseId) -> Vec<ResourceId> {
        self.with(|s| s.resources[&course_id].iter().map(|r| r.id).collect())
    }

    pub fn assessment(&self, course_id: CourseId, index: usize) -> Assessment {
        self.with(|s| s.assessments[&course_id][index].clone())
    }
}

pub fn course(id: CourseId) -> Course {
    Course {
        id,
        title: format!("Course {id}"),
        description: String::new(),
        instructor_id: None,
        instructor_name: Some("Instructor".into()),
        price: None,
        image: None,
        rating: None,
    }
}

pub fn question(text: &str, answer: &str) -> Question {
    Question {
        text: text.into(),
        options: vec![answer.into(), "0".into()],
        answer: answer.into(),
    }
}

pub fn announcement(id: u64, course_id: CourseId, age_hours: i64, expires_in_hours: i64) -> Announcement {
    Announcement {
        id: AnnouncementId::new(id),
        course_id,
        title: format!("Announcement {id}"),
        message: String::new(),
        created_at: fixed_now() - Duration::hours(age_hours),
        expires_at: fixed_now() + Duration::hours(expires_in_hours),
        created_by: None,
    }
}

pub fn notification(id: u64, minutes_ago: i64) -> Notification {
    Notification {
        id: NotificationId::new(id),
        user_id: LEARNER,
        kind: NotificationKind::General,
        title: format!("Notification {id}"),
        message: String::new(),
        created_at: fixed_now() - Duration::minutes(minutes_ago),
        read_at: None,
        related_entity_id: None,
        related_entity_type: None,
    }
}

#[async_trait]
impl LmsApi for FakeApi {
    async fn list_courses(&self) -> Result<Vec<Course>, ApiError> {
        self.enter("list_courses")?;
        Ok(self.with(|s| s.courses.clone()))
    }

    async fn get_course(&self, course_id: CourseId) -> Result<Course, ApiError> {
        self.enter("get_course")?;
        self.with(|s| s.courses.iter().find(|c| c.id == course_id).cloned())
            .ok_or_else(|| ApiError::NotFound(format!("courses/{course_id}")))
    }

    async fn list_resources(&self, course_id: CourseId) -> Result<Vec<Resource>, ApiError> {
        self.enter("list_resources")?;
        Ok(self.with(|s| s.resources.get(&course_id).cloned().unwrap_or_default()))
    }

    async fn list_assessments(&self, course_id: CourseId) -> Result<Vec<Assessment>, ApiError> {
        self.enter("list_assessments")?;
        Ok(self.with(|s| s.assessments.get(&course_id).cloned().unwrap_or_default()))
    }

    async fn list_module_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ModuleProgress>, ApiError> {
        self.enter("list_module_progress")?;
        self.with(|s| {
            if s.progress_offline {
                return Err(unavailable());
            }
            Ok(s.module_progress
                .iter()
                .filter(|r| r.user_id == user_id && r.course_id == course_id)
                .cloned()
                .collect())
        })
    }

    async fn record_module_progress(&self, record: &ModuleProgress) -> Result<(), ApiError> {
        self.enter("record_module_progress")?;
        self.with(|s| s.module_progress.push(record.clone()));
        Ok(())
    }

    async fn list_assessment_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<AssessmentProgress>, ApiError> {
        self.enter("list_assessment_progress")?;
        self.with(|s| {
            if s.progress_offline {
                return Err(unavailable());
            }
            Ok(s.assessment_progress
                .iter()
                .filter(|r| r.user_id == user_id && r.course_id == course_id)
                .cloned()
                .collect())
        })
    }

    async fn submit_assessment_progress(
        &self,
        attempt: &AssessmentProgress,
    ) -> Result<(), ApiError> {
        self.enter("submit_assessment_progress")?;
        self.with(|s| s.assessment_progress.push(attempt.clone()));
        Ok(())
    }

    async fn list_enrollments(&self, _user_id: UserId) -> Result<Vec<Enrollment>, ApiError> {
        self.enter("list_enrollments")?;
        Ok(self.with(|s| s.enrollments.clone()))
    }

    async fn enroll(&self, user_id: UserId, course_id: CourseId) -> Result<Enrollment, ApiError> {
        self.enter("enroll")?;
        Ok(self.with(|s| {
            s.next_id += 1;
            let mut enrollment = Enrollment::new(user_id, course_id);
            enrollment.id = Some(EnrollmentId::new(s.next_id));
            s.enrollments.push(enrollment.clone());
            enrollment
        }))
    }

    async fn unenroll(&self, enrollment_id: EnrollmentId) -> Result<(), ApiError> {
        self.enter("unenroll")?;
        self.with(|s| s.enrollments.retain(|e| e.id != Some(enrollment_id)));
        Ok(())
    }

    async fn delete_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), ApiError> {
        self.enter("delete_course_progress")?;
        self.with(|s| {
            s.module_progress
                .retain(|r| !(r.user_id == user_id && r.course_id == course_id));
        });
        Ok(())
    }

    async fn list_announcements(
        &self,
        _course_ids: &[CourseId],
    ) -> Result<Vec<Announcement>, ApiError> {
        // Returns everything so callers must filter locally.
        self.enter("list_announcements")?;
        Ok(self.with(|s| s.announcements.clone()))
    }

    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>, ApiError> {
        self.enter("list_notifications")?;
        Ok(self.with(|s| {
            s.notifications
                .iter()
                .filter(|n| n.user_id == user_id)
                .cloned()
                .collect()
        }))
    }

    async fn mark_notification_read(&self, id: NotificationId) -> Result<(), ApiError> {
        self.enter("mark_notification_read")?;
        self.with(|s| {
            if s.failing_reads.contains(&id) {
                return Err(unavailable());
            }
            if let Some(n) = s.notifications.iter_mut().find(|n| n.id == id) {
                n.read_at.get_or_insert(fixed_now());
            }
            Ok(())
        })
    }
}
