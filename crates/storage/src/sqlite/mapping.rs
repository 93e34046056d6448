use chrono::{DateTime, Utc};
use lms_core::model::{
    AssessmentId, AssessmentProgress, CourseId, ModuleProgress, Notification, NotificationId,
    NotificationKind, ResourceId, User, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{StorageError, StoredSession};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn get_u64(row: &SqliteRow, field: &'static str) -> Result<u64, StorageError> {
    i64_to_u64(field, row.try_get::<i64, _>(field).map_err(ser)?)
}

fn get_opt_u64(row: &SqliteRow, field: &'static str) -> Result<Option<u64>, StorageError> {
    row.try_get::<Option<i64>, _>(field)
        .map_err(ser)?
        .map(|v| i64_to_u64(field, v))
        .transpose()
}

fn get_flag(row: &SqliteRow, field: &'static str) -> Result<bool, StorageError> {
    Ok(row.try_get::<i64, _>(field).map_err(ser)? != 0)
}

pub(crate) fn map_module_row(row: &SqliteRow) -> Result<ModuleProgress, StorageError> {
    Ok(ModuleProgress {
        id: get_opt_u64(row, "remote_id")?,
        user_id: UserId::new(get_u64(row, "user_id")?),
        course_id: CourseId::new(get_u64(row, "course_id")?),
        resource_id: ResourceId::new(get_u64(row, "resource_id")?),
        completed: get_flag(row, "completed")?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_attempt_row(row: &SqliteRow) -> Result<AssessmentProgress, StorageError> {
    Ok(AssessmentProgress {
        id: get_opt_u64(row, "remote_id")?,
        user_id: UserId::new(get_u64(row, "user_id")?),
        course_id: CourseId::new(get_u64(row, "course_id")?),
        assessment_id: AssessmentId::new(get_u64(row, "assessment_id")?),
        score: i64_to_u32("score", row.try_get("score").map_err(ser)?)?,
        max_score: i64_to_u32("max_score", row.try_get("max_score").map_err(ser)?)?,
        percentage: row.try_get("percentage").map_err(ser)?,
        passed: get_flag(row, "passed")?,
        attempt_number: i64_to_u32("attempt_number", row.try_get("attempt_number").map_err(ser)?)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

pub(crate) fn map_notification_row(row: &SqliteRow) -> Result<Notification, StorageError> {
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;
    Ok(Notification {
        id: NotificationId::new(get_u64(row, "id")?),
        user_id: UserId::new(get_u64(row, "user_id")?),
        kind: NotificationKind::from(row.try_get::<String, _>("kind").map_err(ser)?),
        title: row.try_get("title").map_err(ser)?,
        message: row.try_get("message").map_err(ser)?,
        created_at,
        read_at: row.try_get("read_at").map_err(ser)?,
        related_entity_id: get_opt_u64(row, "related_entity_id")?,
        related_entity_type: row.try_get("related_entity_type").map_err(ser)?,
    })
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<StoredSession, StorageError> {
    Ok(StoredSession {
        user: User {
            id: UserId::new(get_u64(row, "user_id")?),
            name: row.try_get("name").map_err(ser)?,
            email: row.try_get("email").map_err(ser)?,
            username: row.try_get("username").map_err(ser)?,
            role: row.try_get("role").map_err(ser)?,
        },
        token: row.try_get("token").map_err(ser)?,
        saved_at: row.try_get("saved_at").map_err(ser)?,
    })
}
