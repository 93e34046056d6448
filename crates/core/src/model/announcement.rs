use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{AnnouncementId, CourseId, UserId};
use crate::model::wire::timestamp;

/// Course-wide message posted by an instructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: AnnouncementId,
    pub course_id: CourseId,
    pub title: String,
    #[serde(default, alias = "body")]
    pub message: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub created_by: Option<UserId>,
}

impl Announcement {
    /// Expiry is exclusive: an announcement expiring exactly at `now` is gone.
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
