use chrono::Duration;
use lms_core::model::{
    AnnouncementId, AssessmentId, AssessmentProgress, CourseId, ModuleProgress, Notification,
    NotificationId, NotificationKind, ResourceId, User, UserId,
};
use lms_core::time::fixed_now;
use storage::repository::{
    NotificationCache, ProgressCache, ReadReceiptRepository, SessionRepository, StorageError,
    StoredSession,
};
use storage::sqlite::SqliteRepository;

const USER: UserId = UserId::new(7);
const COURSE: CourseId = CourseId::new(3);

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn attempt(assessment: u64, number: u32, passed: bool) -> AssessmentProgress {
    AssessmentProgress {
        id: Some(500 + u64::from(number)),
        user_id: USER,
        course_id: COURSE,
        assessment_id: AssessmentId::new(assessment),
        score: if passed { 4 } else { 2 },
        max_score: 5,
        percentage: if passed { 80.0 } else { 40.0 },
        passed,
        attempt_number: number,
        completed_at: passed.then(fixed_now),
    }
}

fn notification(id: u64, minutes_ago: i64) -> Notification {
    Notification {
        id: NotificationId::new(id),
        user_id: USER,
        kind: NotificationKind::CourseUpdate,
        title: format!("Update {id}"),
        message: "New lecture posted".into(),
        created_at: fixed_now() - Duration::minutes(minutes_ago),
        read_at: None,
        related_entity_id: Some(COURSE.value()),
        related_entity_type: Some("course".into()),
    }
}

#[tokio::test]
async fn sqlite_progress_snapshot_roundtrip() {
    let repo = repo("memdb_progress_snapshot").await;

    let mut pending = ModuleProgress::completed(USER, COURSE, ResourceId::new(2), fixed_now());
    pending.completed = false;
    pending.completed_at = None;
    let done = ModuleProgress::completed(USER, COURSE, ResourceId::new(1), fixed_now());

    repo.replace_snapshot(
        USER,
        COURSE,
        &[pending.clone(), done.clone()],
        &[attempt(10, 1, false), attempt(10, 2, true)],
    )
    .await
    .unwrap();

    let modules = repo.module_progress(USER, COURSE).await.unwrap();
    assert_eq!(modules, vec![done, pending]);

    let attempts = repo.assessment_attempts(USER, COURSE).await.unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1], attempt(10, 2, true));

    // A new snapshot drops rows the server no longer reports.
    repo.replace_snapshot(USER, COURSE, &[], &[attempt(10, 1, false)])
        .await
        .unwrap();
    assert!(repo.module_progress(USER, COURSE).await.unwrap().is_empty());
    assert_eq!(repo.assessment_attempts(USER, COURSE).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_snapshot_keeps_most_recent_duplicate() {
    let repo = repo("memdb_progress_duplicates").await;

    let older = ModuleProgress::completed(USER, COURSE, ResourceId::new(4), fixed_now());
    let mut newer = older.clone();
    newer.completed = false;
    newer.updated_at = Some(fixed_now() + Duration::minutes(5));

    repo.replace_snapshot(USER, COURSE, &[newer.clone(), older], &[])
        .await
        .unwrap();

    let modules = repo.module_progress(USER, COURSE).await.unwrap();
    assert_eq!(modules.len(), 1);
    assert!(!modules[0].completed);
    assert_eq!(modules[0].updated_at, newer.updated_at);
}

#[tokio::test]
async fn sqlite_upsert_is_idempotent_and_purge_is_scoped() {
    let repo = repo("memdb_progress_upsert").await;
    let record = ModuleProgress::completed(USER, COURSE, ResourceId::new(4), fixed_now());
    repo.upsert_module_progress(&record).await.unwrap();
    repo.upsert_module_progress(&record).await.unwrap();

    let other_course = CourseId::new(99);
    let other = ModuleProgress::completed(USER, other_course, ResourceId::new(4), fixed_now());
    repo.upsert_module_progress(&other).await.unwrap();
    repo.record_attempt(&attempt(11, 1, true)).await.unwrap();

    assert_eq!(repo.module_progress(USER, COURSE).await.unwrap().len(), 1);

    repo.purge_course(USER, COURSE).await.unwrap();
    assert!(repo.module_progress(USER, COURSE).await.unwrap().is_empty());
    assert!(repo.assessment_attempts(USER, COURSE).await.unwrap().is_empty());
    assert_eq!(repo.module_progress(USER, other_course).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_notifications_newest_first_and_mark_read() {
    let repo = repo("memdb_notifications").await;
    repo.replace_notifications(USER, &[notification(1, 30), notification(2, 5)])
        .await
        .unwrap();

    repo.mark_read(NotificationId::new(1), fixed_now()).await.unwrap();
    let cached = repo.notifications(USER).await.unwrap();
    let ids: Vec<u64> = cached.iter().map(|n| n.id.value()).collect();
    assert_eq!(ids, vec![2, 1]);
    assert!(cached[0].is_unread());
    assert_eq!(cached[1].read_at, Some(fixed_now()));
    assert_eq!(cached[1].kind, NotificationKind::CourseUpdate);

    let err = repo
        .mark_read(NotificationId::new(404), fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_receipts_keep_first_read() {
    let repo = repo("memdb_receipts").await;
    let id = AnnouncementId::new(12);
    repo.mark_announcement_read(USER, id, fixed_now()).await.unwrap();
    repo.mark_announcement_read(USER, id, fixed_now() + Duration::hours(1))
        .await
        .unwrap();

    let read = repo.read_announcements(USER).await.unwrap();
    assert_eq!(read.len(), 1);
    assert!(read.contains(&id));
    assert!(repo.read_announcements(UserId::new(8)).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_session_save_load_clear() {
    let repo = repo("memdb_session").await;
    assert!(repo.load_session().await.unwrap().is_none());

    let session = StoredSession {
        user: User {
            id: USER,
            name: "Grace Hopper".into(),
            email: Some("grace@example.com".into()),
            username: None,
            role: Some("student".into()),
        },
        token: "token-abc".into(),
        saved_at: fixed_now(),
    };
    repo.save_session(&session).await.unwrap();
    assert_eq!(repo.load_session().await.unwrap(), Some(session.clone()));

    let mut rotated = session;
    rotated.token = "token-def".into();
    repo.save_session(&rotated).await.unwrap();
    assert_eq!(
        repo.load_session().await.unwrap().map(|s| s.token),
        Some("token-def".to_string())
    );

    repo.clear_session().await.unwrap();
    assert!(repo.load_session().await.unwrap().is_none());
}
