use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lms_core::model::{
    AnnouncementId, AssessmentId, AssessmentProgress, CourseId, ModuleProgress, Notification,
    NotificationId, ResourceId, User, UserId,
};
use lms_core::progress::latest_module_progress;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted sign-in state: who is logged in and the bearer token to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub user: User,
    pub token: String,
    pub saved_at: DateTime<Utc>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Local mirror of a learner's per-course progress.
///
/// A successful fetch replaces the whole (user, course) snapshot; local
/// writes upsert single records on top of it.
#[async_trait]
pub trait ProgressCache: Send + Sync {
    /// Cached module-progress records for one learner and course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be read.
    async fn module_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ModuleProgress>, StorageError>;

    /// Cached assessment attempts for one learner and course, oldest attempt first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be read.
    async fn assessment_attempts(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<AssessmentProgress>, StorageError>;

    /// Replace everything cached for (user, course) with a fresh server snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be written.
    async fn replace_snapshot(
        &self,
        user_id: UserId,
        course_id: CourseId,
        modules: &[ModuleProgress],
        attempts: &[AssessmentProgress],
    ) -> Result<(), StorageError>;

    /// Insert or update the record for (user, course, resource).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn upsert_module_progress(&self, record: &ModuleProgress) -> Result<(), StorageError>;

    /// Store one attempt, keyed by (user, course, assessment, attempt number).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be written.
    async fn record_attempt(&self, attempt: &AssessmentProgress) -> Result<(), StorageError>;

    /// Drop every cached record for (user, course).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the purge fails.
    async fn purge_course(&self, user_id: UserId, course_id: CourseId)
    -> Result<(), StorageError>;
}

/// Local mirror of a learner's notifications.
#[async_trait]
pub trait NotificationCache: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be read.
    async fn notifications(&self, user_id: UserId) -> Result<Vec<Notification>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the cache cannot be written.
    async fn replace_notifications(
        &self,
        user_id: UserId,
        notifications: &[Notification],
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the notification is not cached.
    async fn mark_read(&self, id: NotificationId, at: DateTime<Utc>) -> Result<(), StorageError>;
}

/// Per-learner announcement read receipts.
#[async_trait]
pub trait ReadReceiptRepository: Send + Sync {
    /// Record that `user_id` read `announcement_id`. Repeat calls keep the first time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the receipt cannot be written.
    async fn mark_announcement_read(
        &self,
        user_id: UserId,
        announcement_id: AnnouncementId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if receipts cannot be read.
    async fn read_announcements(
        &self,
        user_id: UserId,
    ) -> Result<HashSet<AnnouncementId>, StorageError>;
}

/// Single-slot store for the signed-in session.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be read.
    async fn load_session(&self) -> Result<Option<StoredSession>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be written.
    async fn save_session(&self, session: &StoredSession) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be removed.
    async fn clear_session(&self) -> Result<(), StorageError>;
}

//
// ─── SNAPSHOTS ─────────────────────────────────────────────────────────────────
//

/// Reduce a server snapshot to one row per cache key.
///
/// Module progress keeps the most recent record per resource, the same pick
/// the aggregator makes, so a cached view agrees with the live one. Attempts
/// keep one row per (assessment, attempt number), preferring the latest
/// `completed_at`; later input wins ties.
#[must_use]
pub fn collapse_snapshot(
    modules: &[ModuleProgress],
    attempts: &[AssessmentProgress],
) -> (Vec<ModuleProgress>, Vec<AssessmentProgress>) {
    let mut latest_modules: Vec<ModuleProgress> = latest_module_progress(modules)
        .into_values()
        .cloned()
        .collect();
    latest_modules.sort_by_key(|r| r.resource_id);

    let mut by_attempt: HashMap<(AssessmentId, u32), &AssessmentProgress> =
        HashMap::with_capacity(attempts.len());
    for attempt in attempts {
        by_attempt
            .entry((attempt.assessment_id, attempt.attempt_number))
            .and_modify(|current| {
                if attempt.completed_at >= current.completed_at {
                    *current = attempt;
                }
            })
            .or_insert(attempt);
    }
    let mut latest_attempts: Vec<AssessmentProgress> =
        by_attempt.into_values().cloned().collect();
    latest_attempts.sort_by_key(|a| (a.assessment_id, a.attempt_number));

    (latest_modules, latest_attempts)
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

type CourseKey = (UserId, CourseId);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    modules: Arc<Mutex<HashMap<CourseKey, HashMap<ResourceId, ModuleProgress>>>>,
    attempts: Arc<Mutex<HashMap<CourseKey, HashMap<(AssessmentId, u32), AssessmentProgress>>>>,
    notifications: Arc<Mutex<HashMap<UserId, Vec<Notification>>>>,
    receipts: Arc<Mutex<HashMap<UserId, HashMap<AnnouncementId, DateTime<Utc>>>>>,
    session: Arc<Mutex<Option<StoredSession>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

#[async_trait]
impl ProgressCache for InMemoryRepository {
    async fn module_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ModuleProgress>, StorageError> {
        let guard = lock(&self.modules)?;
        let mut records: Vec<ModuleProgress> = guard
            .get(&(user_id, course_id))
            .map(|by_resource| by_resource.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by_key(|r| r.resource_id);
        Ok(records)
    }

    async fn assessment_attempts(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<AssessmentProgress>, StorageError> {
        let guard = lock(&self.attempts)?;
        let mut records: Vec<AssessmentProgress> = guard
            .get(&(user_id, course_id))
            .map(|by_attempt| by_attempt.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by_key(|r| (r.assessment_id, r.attempt_number));
        Ok(records)
    }

    async fn replace_snapshot(
        &self,
        user_id: UserId,
        course_id: CourseId,
        modules: &[ModuleProgress],
        attempts: &[AssessmentProgress],
    ) -> Result<(), StorageError> {
        let key = (user_id, course_id);
        let (modules, attempts) = collapse_snapshot(modules, attempts);
        {
            let mut guard = lock(&self.modules)?;
            let slot = guard.entry(key).or_default();
            slot.clear();
            for record in modules {
                slot.insert(record.resource_id, record);
            }
        }
        let mut guard = lock(&self.attempts)?;
        let slot = guard.entry(key).or_default();
        slot.clear();
        for attempt in attempts {
            slot.insert((attempt.assessment_id, attempt.attempt_number), attempt);
        }
        Ok(())
    }

    async fn upsert_module_progress(&self, record: &ModuleProgress) -> Result<(), StorageError> {
        let mut guard = lock(&self.modules)?;
        guard
            .entry((record.user_id, record.course_id))
            .or_default()
            .insert(record.resource_id, record.clone());
        Ok(())
    }

    async fn record_attempt(&self, attempt: &AssessmentProgress) -> Result<(), StorageError> {
        let mut guard = lock(&self.attempts)?;
        guard
            .entry((attempt.user_id, attempt.course_id))
            .or_default()
            .insert(
                (attempt.assessment_id, attempt.attempt_number),
                attempt.clone(),
            );
        Ok(())
    }

    async fn purge_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), StorageError> {
        lock(&self.modules)?.remove(&(user_id, course_id));
        lock(&self.attempts)?.remove(&(user_id, course_id));
        Ok(())
    }
}

#[async_trait]
impl NotificationCache for InMemoryRepository {
    async fn notifications(&self, user_id: UserId) -> Result<Vec<Notification>, StorageError> {
        Ok(lock(&self.notifications)?
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_notifications(
        &self,
        user_id: UserId,
        notifications: &[Notification],
    ) -> Result<(), StorageError> {
        lock(&self.notifications)?.insert(user_id, notifications.to_vec());
        Ok(())
    }

    async fn mark_read(&self, id: NotificationId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut guard = lock(&self.notifications)?;
        let notification = guard
            .values_mut()
            .flat_map(|list| list.iter_mut())
            .find(|n| n.id == id)
            .ok_or(StorageError::NotFound)?;
        notification.read_at.get_or_insert(at);
        Ok(())
    }
}

#[async_trait]
impl ReadReceiptRepository for InMemoryRepository {
    async fn mark_announcement_read(
        &self,
        user_id: UserId,
        announcement_id: AnnouncementId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        lock(&self.receipts)?
            .entry(user_id)
            .or_default()
            .entry(announcement_id)
            .or_insert(at);
        Ok(())
    }

    async fn read_announcements(
        &self,
        user_id: UserId,
    ) -> Result<HashSet<AnnouncementId>, StorageError> {
        Ok(lock(&self.receipts)?
            .get(&user_id)
            .map(|by_id| by_id.keys().copied().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn load_session(&self) -> Result<Option<StoredSession>, StorageError> {
        Ok(lock(&self.session)?.clone())
    }

    async fn save_session(&self, session: &StoredSession) -> Result<(), StorageError> {
        *lock(&self.session)? = Some(session.clone());
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), StorageError> {
        *lock(&self.session)? = None;
        Ok(())
    }
}

/// Aggregates the cache repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressCache>,
    pub notifications: Arc<dyn NotificationCache>,
    pub receipts: Arc<dyn ReadReceiptRepository>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            progress: Arc::new(repo.clone()),
            notifications: Arc::new(repo.clone()),
            receipts: Arc::new(repo.clone()),
            sessions: Arc::new(repo),
        }
    }
}
