use std::collections::HashSet;
use std::sync::Arc;

use lms_core::Clock;
use lms_core::inbox::visible_announcements;
use lms_core::model::{Announcement, AnnouncementId, CourseId, UserId};
use storage::repository::ReadReceiptRepository;
use tracing::debug;

use crate::api::LmsApi;
use crate::error::InboxError;

/// Visible announcements plus this learner's read receipts.
#[derive(Debug, Clone, Default)]
pub struct AnnouncementFeed {
    /// Enrolled, unexpired, newest first.
    pub announcements: Vec<Announcement>,
    pub read: HashSet<AnnouncementId>,
}

impl AnnouncementFeed {
    pub fn unread(&self) -> impl Iterator<Item = &Announcement> {
        self.announcements
            .iter()
            .filter(|a| !self.read.contains(&a.id))
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.unread().count()
    }

    #[must_use]
    pub fn is_read(&self, id: AnnouncementId) -> bool {
        self.read.contains(&id)
    }
}

#[derive(Clone)]
pub struct AnnouncementService {
    clock: Clock,
    api: Arc<dyn LmsApi>,
    receipts: Arc<dyn ReadReceiptRepository>,
}

impl AnnouncementService {
    #[must_use]
    pub fn new(
        clock: Clock,
        api: Arc<dyn LmsApi>,
        receipts: Arc<dyn ReadReceiptRepository>,
    ) -> Self {
        Self {
            clock,
            api,
            receipts,
        }
    }

    /// Announcements for the learner's enrolled courses.
    ///
    /// The server is asked for `enrolled` only, and the result is filtered
    /// again locally so expiry is judged against this client's clock.
    ///
    /// # Errors
    ///
    /// Returns `InboxError` if the fetch or the receipt lookup fails.
    pub async fn feed(
        &self,
        user_id: UserId,
        enrolled: &HashSet<CourseId>,
    ) -> Result<AnnouncementFeed, InboxError> {
        let mut course_ids: Vec<CourseId> = enrolled.iter().copied().collect();
        course_ids.sort_unstable();

        let (all, read) = futures::try_join!(
            async { Ok::<_, InboxError>(self.api.list_announcements(&course_ids).await?) },
            async { Ok::<_, InboxError>(self.receipts.read_announcements(user_id).await?) },
        )?;

        let announcements = visible_announcements(&all, enrolled, self.clock.now());
        debug!(
            %user_id,
            fetched = all.len(),
            visible = announcements.len(),
            "announcements filtered"
        );
        Ok(AnnouncementFeed {
            announcements,
            read,
        })
    }

    /// Record a read receipt for this learner only.
    ///
    /// # Errors
    ///
    /// Returns `InboxError::Storage` if the receipt cannot be saved.
    pub async fn mark_read(&self, user_id: UserId, id: AnnouncementId) -> Result<(), InboxError> {
        self.receipts
            .mark_announcement_read(user_id, id, self.clock.now())
            .await?;
        Ok(())
    }
}
