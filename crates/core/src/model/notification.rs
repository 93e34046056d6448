use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{NotificationId, UserId};
use crate::model::wire::{option_timestamp, timestamp};

/// Category tag carried by a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    CourseUpdate,
    Assessment,
    Enrollment,
    Feedback,
    #[default]
    General,
    Other(String),
}

impl NotificationKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::CourseUpdate => "course_update",
            Self::Assessment => "assessment",
            Self::Enrollment => "enrollment",
            Self::Feedback => "feedback",
            Self::General => "general",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for NotificationKind {
    fn from(raw: String) -> Self {
        match raw.trim() {
            "course_update" => Self::CourseUpdate,
            "assessment" => Self::Assessment,
            "enrollment" => Self::Enrollment,
            "feedback" => Self::Feedback,
            "" | "general" => Self::General,
            _ => Self::Other(raw),
        }
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        kind.as_str().to_owned()
    }
}

/// Per-learner message. Read state belongs to this record alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    #[serde(default, rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    #[serde(default, alias = "body")]
    pub message: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "option_timestamp")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub related_entity_id: Option<u64>,
    #[serde(default)]
    pub related_entity_type: Option<String>,
}

impl Notification {
    #[must_use]
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}
