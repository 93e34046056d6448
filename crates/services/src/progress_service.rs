//! Course progress with a read-through/write-through local cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use lms_core::model::{
    Assessment, AssessmentId, AssessmentProgress, Course, CourseId, ModuleProgress, Resource,
    ResourceId, UserId,
};
use lms_core::progress::{latest_module_progress, next_attempt_number};
use lms_core::{Clock, CourseProgress, ItemState, QuizGrade, compute_progress, grade_quiz, item_states};
use storage::repository::ProgressCache;
use tracing::{debug, info, warn};

use crate::api::LmsApi;
use crate::error::ProgressError;

//
// ─── CACHE ─────────────────────────────────────────────────────────────────────
//

/// Where the progress records behind a view came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSource {
    /// Fetched from the server just now.
    Live,
    /// Server unreachable; last cached snapshot.
    Cached,
    /// Nothing usable; progress is the zero state.
    Unavailable,
}

/// Progress records for one (learner, course).
#[derive(Debug, Clone)]
pub struct ProgressRecords {
    pub modules: Vec<ModuleProgress>,
    pub attempts: Vec<AssessmentProgress>,
    pub source: ProgressSource,
}

/// Read-through/write-through access to progress records.
///
/// A successful fetch replaces the cached snapshot for (user, course). A failed
/// fetch falls back to whatever the cache holds.
#[derive(Clone)]
pub struct CachedProgress {
    api: Arc<dyn LmsApi>,
    cache: Arc<dyn ProgressCache>,
}

impl CachedProgress {
    #[must_use]
    pub fn new(api: Arc<dyn LmsApi>, cache: Arc<dyn ProgressCache>) -> Self {
        Self { api, cache }
    }

    /// Fetch both record kinds concurrently, degrading to the cache on failure.
    pub async fn records(&self, user_id: UserId, course_id: CourseId) -> ProgressRecords {
        let fetched = futures::try_join!(
            self.api.list_module_progress(user_id, course_id),
            self.api.list_assessment_progress(user_id, course_id),
        );

        match fetched {
            Ok((modules, attempts)) => {
                if let Err(err) = self
                    .cache
                    .replace_snapshot(user_id, course_id, &modules, &attempts)
                    .await
                {
                    warn!(%user_id, %course_id, error = %err, "failed to cache progress snapshot");
                }
                ProgressRecords {
                    modules,
                    attempts,
                    source: ProgressSource::Live,
                }
            }
            Err(err) => {
                warn!(%user_id, %course_id, error = %err, "progress fetch failed; using cache");
                self.cached(user_id, course_id).await
            }
        }
    }

    async fn cached(&self, user_id: UserId, course_id: CourseId) -> ProgressRecords {
        let cached = futures::try_join!(
            self.cache.module_progress(user_id, course_id),
            self.cache.assessment_attempts(user_id, course_id),
        );
        match cached {
            Ok((modules, attempts)) if !(modules.is_empty() && attempts.is_empty()) => {
                ProgressRecords {
                    modules,
                    attempts,
                    source: ProgressSource::Cached,
                }
            }
            Ok(_) => Self::unavailable(),
            Err(err) => {
                warn!(%user_id, %course_id, error = %err, "progress cache unreadable");
                Self::unavailable()
            }
        }
    }

    fn unavailable() -> ProgressRecords {
        ProgressRecords {
            modules: Vec::new(),
            attempts: Vec::new(),
            source: ProgressSource::Unavailable,
        }
    }

    /// Send a module record to the server, then mirror it locally.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the server or cache write fails.
    pub async fn write_module(&self, record: &ModuleProgress) -> Result<(), ProgressError> {
        self.api.record_module_progress(record).await?;
        self.cache.upsert_module_progress(record).await?;
        Ok(())
    }

    /// Send an attempt to the server, then mirror it locally.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the server or cache write fails.
    pub async fn write_attempt(&self, attempt: &AssessmentProgress) -> Result<(), ProgressError> {
        self.api.submit_assessment_progress(attempt).await?;
        self.cache.record_attempt(attempt).await?;
        Ok(())
    }

    /// Cached module records only; no network.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the cache cannot be read.
    pub async fn cached_modules(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ModuleProgress>, ProgressError> {
        Ok(self.cache.module_progress(user_id, course_id).await?)
    }
}

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

/// Everything the course player shows for one learner and course.
#[derive(Debug, Clone)]
pub struct CourseView {
    pub course_id: CourseId,
    pub resources: Vec<Resource>,
    pub assessments: Vec<Assessment>,
    pub items: Vec<ItemState>,
    pub progress: CourseProgress,
    pub source: ProgressSource,
}

impl CourseView {
    fn unavailable(course_id: CourseId) -> Self {
        Self {
            course_id,
            resources: Vec::new(),
            assessments: Vec::new(),
            items: Vec::new(),
            progress: CourseProgress::empty(),
            source: ProgressSource::Unavailable,
        }
    }

    #[must_use]
    pub fn assessment(&self, id: AssessmentId) -> Option<&Assessment> {
        self.assessments.iter().find(|a| a.id == id)
    }
}

/// One dashboard row.
#[derive(Debug, Clone)]
pub struct DashboardEntry {
    pub course_id: CourseId,
    pub course: Option<Course>,
    pub progress: CourseProgress,
    pub source: ProgressSource,
}

/// Result of a graded and recorded quiz submission.
#[derive(Debug, Clone)]
pub struct QuizSubmission {
    pub grade: QuizGrade,
    pub attempt: AssessmentProgress,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    api: Arc<dyn LmsApi>,
    records: CachedProgress,
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, api: Arc<dyn LmsApi>, cache: Arc<dyn ProgressCache>) -> Self {
        let records = CachedProgress::new(Arc::clone(&api), cache);
        Self {
            clock,
            api,
            records,
        }
    }

    /// Load course structure and progress concurrently and aggregate them.
    ///
    /// Never fails: a structure fetch failure yields the zero state, and a
    /// progress fetch failure falls back to cached records.
    pub async fn course_view(&self, user_id: UserId, course_id: CourseId) -> CourseView {
        let (structure, records) = tokio::join!(
            async {
                futures::try_join!(
                    self.api.list_resources(course_id),
                    self.api.list_assessments(course_id),
                )
            },
            self.records.records(user_id, course_id),
        );

        let (resources, assessments) = match structure {
            Ok(structure) => structure,
            Err(err) => {
                warn!(%user_id, %course_id, error = %err, "course structure unavailable");
                return CourseView::unavailable(course_id);
            }
        };

        if records.source == ProgressSource::Unavailable {
            let mut view = CourseView::unavailable(course_id);
            view.resources = resources;
            view.assessments = assessments;
            return view;
        }

        let progress = compute_progress(&resources, &assessments, &records.modules, &records.attempts);
        let items = item_states(&resources, &assessments, &records.modules, &records.attempts);
        debug!(
            %user_id,
            %course_id,
            completed = progress.completed_items,
            total = progress.total_items,
            "course progress computed"
        );

        CourseView {
            course_id,
            resources,
            assessments,
            items,
            progress,
            source: records.source,
        }
    }

    pub async fn course_progress(&self, user_id: UserId, course_id: CourseId) -> CourseProgress {
        self.course_view(user_id, course_id).await.progress
    }

    /// Progress for every course in `course_ids`, each computed independently.
    pub async fn dashboard(&self, user_id: UserId, course_ids: &[CourseId]) -> Vec<DashboardEntry> {
        let rows = course_ids.iter().map(|&course_id| async move {
            let (course, view) = tokio::join!(
                self.api.get_course(course_id),
                self.course_view(user_id, course_id),
            );
            let course = course
                .inspect_err(|err| warn!(%course_id, error = %err, "course details unavailable"))
                .ok();
            DashboardEntry {
                course_id,
                course,
                progress: view.progress,
                source: view.source,
            }
        });
        join_all(rows).await
    }

    /// Record that the learner finished a resource.
    ///
    /// A resource already completed in the cache is left alone.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the server or cache write fails.
    pub async fn mark_resource_complete(
        &self,
        user_id: UserId,
        course_id: CourseId,
        resource_id: ResourceId,
    ) -> Result<CourseProgress, ProgressError> {
        let cached = self.records.cached_modules(user_id, course_id).await?;
        let already_done = latest_module_progress(&cached)
            .get(&resource_id)
            .is_some_and(|record| record.completed);

        if already_done {
            debug!(%user_id, %course_id, %resource_id, "resource already complete");
        } else {
            let record = ModuleProgress::completed(user_id, course_id, resource_id, self.clock.now());
            self.records.write_module(&record).await?;
            info!(%user_id, %course_id, %resource_id, "resource marked complete");
        }

        Ok(self.course_progress(user_id, course_id).await)
    }

    /// Fetch one assessment of a course.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownAssessment` if the course has no such
    /// assessment, or `ProgressError::Api` if the fetch fails.
    pub async fn assessment(
        &self,
        course_id: CourseId,
        assessment_id: AssessmentId,
    ) -> Result<Assessment, ProgressError> {
        let assessment = self
            .api
            .list_assessments(course_id)
            .await?
            .into_iter()
            .find(|a| a.id == assessment_id)
            .ok_or(ProgressError::UnknownAssessment {
                course_id,
                assessment_id,
            })?;

        let unanswerable = assessment.unanswerable_questions();
        if !unanswerable.is_empty() {
            warn!(
                %course_id,
                %assessment_id,
                questions = ?unanswerable,
                "stored answer is not among the options"
            );
        }
        Ok(assessment)
    }

    /// Grade a submission and record it as a new attempt.
    ///
    /// Grading happens before any network call, so an incomplete submission
    /// changes nothing. Re-submissions append with the next attempt number.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Grading` for an incomplete or empty quiz, or a
    /// server/cache error if recording fails.
    pub async fn submit_quiz(
        &self,
        user_id: UserId,
        course_id: CourseId,
        assessment: &Assessment,
        answers: &BTreeMap<usize, String>,
    ) -> Result<QuizSubmission, ProgressError> {
        let grade = grade_quiz(&assessment.questions, answers)?;

        let history = self.records.records(user_id, course_id).await;
        let attempt_number = next_attempt_number(&history.attempts, assessment.id);
        let attempt = AssessmentProgress::from_grade(
            user_id,
            course_id,
            assessment.id,
            &grade,
            attempt_number,
            self.clock.now(),
        );
        self.records.write_attempt(&attempt).await?;

        info!(
            %user_id,
            %course_id,
            assessment_id = %assessment.id,
            attempt = attempt_number,
            score = grade.score,
            passed = grade.passed,
            "quiz submitted"
        );
        Ok(QuizSubmission { grade, attempt })
    }
}
