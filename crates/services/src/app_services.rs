use std::sync::Arc;
use std::time::Duration;

use lms_core::inbox::unread_count;
use lms_core::model::{Notification, UserId};
use storage::repository::{SessionRepository, Storage};
use tracing::warn;

use crate::Clock;
use crate::announcement_service::{AnnouncementFeed, AnnouncementService};
use crate::api::{HttpLmsApi, LmsApi};
use crate::certificate::CompletionTracker;
use crate::config::ClientConfig;
use crate::enrollment_service::EnrollmentService;
use crate::error::AppServicesError;
use crate::notification_service::NotificationService;
use crate::poller::Poller;
use crate::progress_service::ProgressService;
use crate::session::SessionStore;

/// Announcements and notifications fetched together for the navbar.
#[derive(Debug, Clone, Default)]
pub struct InboxSnapshot {
    pub announcements: AnnouncementFeed,
    pub notifications: Vec<Notification>,
}

impl InboxSnapshot {
    #[must_use]
    pub fn unread_notifications(&self) -> usize {
        unread_count(&self.notifications)
    }
}

/// Assembles app-facing services around one API client and one cache.
#[derive(Clone)]
pub struct AppServices {
    poll_interval: Duration,
    api: Arc<dyn LmsApi>,
    session: Arc<SessionStore>,
    progress: Arc<ProgressService>,
    completion: Arc<CompletionTracker>,
    enrollments: Arc<EnrollmentService>,
    announcements: Arc<AnnouncementService>,
    notifications: Arc<NotificationService>,
}

impl AppServices {
    #[must_use]
    pub fn new(clock: Clock, api: Arc<dyn LmsApi>, storage: &Storage, poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            api: Arc::clone(&api),
            session: Arc::new(SessionStore::new(clock, Arc::clone(&storage.sessions))),
            progress: Arc::new(ProgressService::new(
                clock,
                Arc::clone(&api),
                Arc::clone(&storage.progress),
            )),
            completion: Arc::new(CompletionTracker::new(clock)),
            enrollments: Arc::new(EnrollmentService::new(
                Arc::clone(&api),
                Arc::clone(&storage.progress),
            )),
            announcements: Arc::new(AnnouncementService::new(
                clock,
                Arc::clone(&api),
                Arc::clone(&storage.receipts),
            )),
            notifications: Arc::new(NotificationService::new(
                clock,
                api,
                Arc::clone(&storage.notifications),
            )),
        }
    }

    /// Build services backed by the HTTP API and a `SQLite` cache.
    ///
    /// Without a configured token, the API authenticates with the token
    /// saved by the last sign-in.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the cache cannot be opened or the HTTP
    /// client cannot be built.
    pub async fn from_config(config: &ClientConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.cache_db_url).await?;
        let saved = storage.sessions.load_session().await?;
        let config = config
            .clone()
            .with_saved_token(saved.as_ref().map(|s| s.token.as_str()));
        let api: Arc<dyn LmsApi> = Arc::new(HttpLmsApi::new(&config)?);
        let services = Self::new(clock, api, &storage, config.poll_interval);
        services.session.restore().await?;
        Ok(services)
    }

    /// Services over `api` with an in-memory cache.
    #[must_use]
    pub fn in_memory(clock: Clock, api: Arc<dyn LmsApi>) -> Self {
        Self::new(
            clock,
            api,
            &Storage::in_memory(),
            crate::config::DEFAULT_POLL_INTERVAL,
        )
    }

    #[must_use]
    pub fn api(&self) -> Arc<dyn LmsApi> {
        Arc::clone(&self.api)
    }

    #[must_use]
    pub fn session(&self) -> Arc<SessionStore> {
        Arc::clone(&self.session)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn completion(&self) -> Arc<CompletionTracker> {
        Arc::clone(&self.completion)
    }

    #[must_use]
    pub fn enrollments(&self) -> Arc<EnrollmentService> {
        Arc::clone(&self.enrollments)
    }

    #[must_use]
    pub fn announcements(&self) -> Arc<AnnouncementService> {
        Arc::clone(&self.announcements)
    }

    #[must_use]
    pub fn notifications(&self) -> Arc<NotificationService> {
        Arc::clone(&self.notifications)
    }

    /// Refresh both inbox feeds and publish unread counts to the session.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if enrollments, announcements or
    /// notifications cannot be loaded.
    pub async fn refresh_inbox(&self, user_id: UserId) -> Result<InboxSnapshot, AppServicesError> {
        let enrolled = self.enrollments.enrolled_course_ids(user_id).await?;
        let (announcements, notifications) = tokio::join!(
            self.announcements.feed(user_id, &enrolled),
            self.notifications.refresh(user_id),
        );
        let snapshot = InboxSnapshot {
            announcements: announcements?,
            notifications: notifications?,
        };

        self.session.update(|state| {
            state.unread_announcements = snapshot.announcements.unread_count();
            state.unread_notifications = snapshot.unread_notifications();
        });
        Ok(snapshot)
    }

    /// Poll the inbox for `user_id` at the configured interval.
    ///
    /// Failures are logged and retried on the next tick.
    #[must_use]
    pub fn start_inbox_poller(&self, user_id: UserId) -> Poller {
        let mut poller = Poller::new(self.poll_interval);
        let services = self.clone();
        poller.start(move || {
            let services = services.clone();
            async move {
                if let Err(err) = services.refresh_inbox(user_id).await {
                    warn!(%user_id, error = %err, "inbox refresh failed");
                }
            }
        });
        poller
    }
}
