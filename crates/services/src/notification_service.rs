use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use lms_core::Clock;
use lms_core::inbox::{MarkAllOutcome, apply_read_results, sort_newest_first};
use lms_core::model::{Notification, NotificationId, UserId};
use storage::repository::{NotificationCache, StorageError};
use tracing::{info, warn};

use crate::api::LmsApi;
use crate::error::InboxError;

#[derive(Clone)]
pub struct NotificationService {
    clock: Clock,
    api: Arc<dyn LmsApi>,
    cache: Arc<dyn NotificationCache>,
}

impl NotificationService {
    #[must_use]
    pub fn new(clock: Clock, api: Arc<dyn LmsApi>, cache: Arc<dyn NotificationCache>) -> Self {
        Self { clock, api, cache }
    }

    /// Fetch notifications, newest first, and mirror them locally.
    ///
    /// Falls back to the cached list when the server is unreachable.
    ///
    /// # Errors
    ///
    /// Returns `InboxError` only when both the server and the cache fail.
    pub async fn refresh(&self, user_id: UserId) -> Result<Vec<Notification>, InboxError> {
        match self.api.list_notifications(user_id).await {
            Ok(mut notifications) => {
                sort_newest_first(&mut notifications);
                if let Err(err) = self.cache.replace_notifications(user_id, &notifications).await {
                    warn!(%user_id, error = %err, "failed to cache notifications");
                }
                Ok(notifications)
            }
            Err(err) => {
                warn!(%user_id, error = %err, "notification fetch failed; using cache");
                self.cached(user_id).await
            }
        }
    }

    /// Cached notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `InboxError::Storage` if the cache cannot be read.
    pub async fn cached(&self, user_id: UserId) -> Result<Vec<Notification>, InboxError> {
        let mut notifications = self.cache.notifications(user_id).await?;
        sort_newest_first(&mut notifications);
        Ok(notifications)
    }

    /// Mark one notification read on the server, then locally.
    ///
    /// A notification the cache has not seen yet is only marked on the server.
    ///
    /// # Errors
    ///
    /// Returns `InboxError::Api` if the server rejects the update.
    pub async fn mark_read(&self, id: NotificationId) -> Result<(), InboxError> {
        self.api.mark_notification_read(id).await?;
        self.mirror_read(id, self.clock.now()).await;
        Ok(())
    }

    /// Mark every currently unread notification read, one request each.
    ///
    /// The unread set comes from the server, falling back to the cache when
    /// the server is unreachable. Requests run concurrently. Only confirmed
    /// updates are applied locally; the rest are reported in
    /// `MarkAllOutcome::failed`.
    ///
    /// # Errors
    ///
    /// Returns `InboxError` only when neither the server nor the cache can
    /// list notifications.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<MarkAllOutcome, InboxError> {
        let mut notifications = self.refresh(user_id).await?;
        let pending: Vec<NotificationId> = notifications
            .iter()
            .filter(|n| n.is_unread())
            .map(|n| n.id)
            .collect();

        let results = join_all(pending.iter().map(|&id| async move {
            let result = self.api.mark_notification_read(id).await;
            if let Err(err) = &result {
                warn!(%user_id, notification_id = %id, error = %err, "mark read failed");
            }
            (id, result)
        }))
        .await;

        let read_at = self.clock.now();
        let outcome = apply_read_results(&mut notifications, results, read_at);
        for id in &outcome.marked {
            self.mirror_read(*id, read_at).await;
        }

        info!(
            %user_id,
            marked = outcome.marked.len(),
            failed = outcome.failed.len(),
            "mark all read finished"
        );
        Ok(outcome)
    }

    /// Record a server-confirmed read in the cache. Failures are logged; the
    /// next refresh brings the cache back in line.
    async fn mirror_read(&self, id: NotificationId, read_at: DateTime<Utc>) {
        match self.cache.mark_read(id, read_at).await {
            Ok(()) | Err(StorageError::NotFound) => {}
            Err(err) => {
                warn!(notification_id = %id, error = %err, "failed to cache read state");
            }
        }
    }
}
