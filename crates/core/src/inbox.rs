//! Announcement and notification filtering.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::model::{Announcement, AnnouncementId, CourseId, Notification, NotificationId};

/// Badge counts above this render as `"9+"`.
pub const BADGE_CAP: usize = 9;

//
// ─── ANNOUNCEMENTS ────────────────────────────────────────────────────────────
//

/// Announcements for enrolled courses that have not expired, newest first.
#[must_use]
pub fn visible_announcements(
    all: &[Announcement],
    enrolled: &HashSet<CourseId>,
    now: DateTime<Utc>,
) -> Vec<Announcement> {
    let mut visible: Vec<Announcement> = all
        .iter()
        .filter(|a| enrolled.contains(&a.course_id) && a.is_live_at(now))
        .cloned()
        .collect();
    visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    visible
}

#[must_use]
pub fn announcement_unread_count(
    all: &[Announcement],
    enrolled: &HashSet<CourseId>,
    now: DateTime<Utc>,
) -> usize {
    all.iter()
        .filter(|a| enrolled.contains(&a.course_id) && a.is_live_at(now))
        .count()
}

/// Like [`visible_announcements`], minus the ones this learner already read.
#[must_use]
pub fn visible_unread_announcements(
    all: &[Announcement],
    enrolled: &HashSet<CourseId>,
    read: &HashSet<AnnouncementId>,
    now: DateTime<Utc>,
) -> Vec<Announcement> {
    let mut visible = visible_announcements(all, enrolled, now);
    visible.retain(|a| !read.contains(&a.id));
    visible
}

//
// ─── NOTIFICATIONS ────────────────────────────────────────────────────────────
//

#[must_use]
pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| n.is_unread()).count()
}

/// Badge text for an unread count; `None` when there is nothing to show.
#[must_use]
pub fn badge_label(count: usize) -> Option<String> {
    match count {
        0 => None,
        n if n > BADGE_CAP => Some(format!("{BADGE_CAP}+")),
        n => Some(n.to_string()),
    }
}

pub fn sort_newest_first(notifications: &mut [Notification]) {
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Per-record result of a bulk mark-as-read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkAllOutcome {
    pub marked: Vec<NotificationId>,
    pub failed: Vec<NotificationId>,
}

impl MarkAllOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Apply confirmed mark-as-read results to local state.
///
/// Only notifications whose own update succeeded get `read_at`; failures are
/// left unread and reported back.
pub fn apply_read_results<E>(
    notifications: &mut [Notification],
    results: impl IntoIterator<Item = (NotificationId, Result<(), E>)>,
    read_at: DateTime<Utc>,
) -> MarkAllOutcome {
    let mut outcome = MarkAllOutcome::default();
    for (id, result) in results {
        if result.is_err() {
            outcome.failed.push(id);
            continue;
        }
        if let Some(notification) = notifications.iter_mut().find(|n| n.id == id) {
            notification.read_at.get_or_insert(read_at);
        }
        outcome.marked.push(id);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NotificationKind, UserId};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn announcement(id: u64, course: u64, age_hours: i64, expires_in_hours: i64) -> Announcement {
        let now = fixed_now();
        Announcement {
            id: AnnouncementId::new(id),
            course_id: CourseId::new(course),
            title: format!("Announcement {id}"),
            message: String::new(),
            created_at: now - Duration::hours(age_hours),
            expires_at: now + Duration::hours(expires_in_hours),
            created_by: None,
        }
    }

    fn notification(id: u64, read: bool) -> Notification {
        Notification {
            id: NotificationId::new(id),
            user_id: UserId::new(1),
            kind: NotificationKind::General,
            title: format!("Notification {id}"),
            message: String::new(),
            created_at: fixed_now() - Duration::minutes(i64::try_from(id).unwrap()),
            read_at: read.then(fixed_now),
            related_entity_id: None,
            related_entity_type: None,
        }
    }

    fn enrolled(ids: &[u64]) -> HashSet<CourseId> {
        ids.iter().copied().map(CourseId::new).collect()
    }

    #[test]
    fn keeps_enrolled_unexpired_newest_first() {
        let all = vec![
            announcement(1, 1, 5, 24),
            announcement(2, 2, 1, 24),
            announcement(3, 1, 3, 24),
            announcement(4, 3, 0, 24),
        ];
        let visible = visible_announcements(&all, &enrolled(&[1, 2]), fixed_now());
        let ids: Vec<u64> = visible.iter().map(|a| a.id.value()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(
            announcement_unread_count(&all, &enrolled(&[1, 2]), fixed_now()),
            3
        );
    }

    #[test]
    fn expired_announcement_is_hidden_even_when_enrolled() {
        let all = vec![announcement(1, 1, 48, -1), announcement(2, 1, 1, 0)];
        assert!(visible_announcements(&all, &enrolled(&[1]), fixed_now()).is_empty());
    }

    #[test]
    fn read_receipts_hide_only_for_this_learner() {
        let all = vec![announcement(1, 1, 2, 24), announcement(2, 1, 1, 24)];
        let read: HashSet<AnnouncementId> = [AnnouncementId::new(2)].into_iter().collect();
        let visible = visible_unread_announcements(&all, &enrolled(&[1]), &read, fixed_now());
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, AnnouncementId::new(1));
        assert_eq!(visible_announcements(&all, &enrolled(&[1]), fixed_now()).len(), 2);
    }

    #[test]
    fn unread_count_ignores_read_notifications() {
        let list = vec![notification(1, false), notification(2, true), notification(3, false)];
        assert_eq!(unread_count(&list), 2);
    }

    #[test]
    fn badge_caps_at_nine() {
        assert_eq!(badge_label(0), None);
        assert_eq!(badge_label(4).as_deref(), Some("4"));
        assert_eq!(badge_label(12).as_deref(), Some("9+"));
    }

    #[test]
    fn partial_mark_all_only_marks_confirmed() {
        let mut list = vec![notification(1, false), notification(2, false), notification(3, false)];
        let results = vec![
            (NotificationId::new(1), Ok(())),
            (NotificationId::new(2), Err("timeout")),
            (NotificationId::new(3), Ok(())),
        ];
        let outcome = apply_read_results(&mut list, results, fixed_now());

        assert_eq!(outcome.failed, vec![NotificationId::new(2)]);
        assert!(!outcome.is_complete());
        assert_eq!(unread_count(&list), 1);
        assert!(list[1].is_unread());
    }

    #[test]
    fn sort_puts_newest_first() {
        let mut list = vec![notification(3, false), notification(1, false), notification(2, false)];
        sort_newest_first(&mut list);
        let ids: Vec<u64> = list.iter().map(|n| n.id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
