use lms_core::model::{AssessmentProgress, CourseId, ModuleProgress, UserId};
use sqlx::{Sqlite, Transaction};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_attempt_row, map_module_row};
use crate::repository::{ProgressCache, StorageError, collapse_snapshot};

async fn insert_module(
    tx: &mut Transaction<'_, Sqlite>,
    record: &ModuleProgress,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO module_progress (user_id, course_id, resource_id, remote_id, completed, completed_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(user_id, course_id, resource_id) DO UPDATE SET
            remote_id = COALESCE(excluded.remote_id, module_progress.remote_id),
            completed = excluded.completed,
            completed_at = excluded.completed_at,
            updated_at = excluded.updated_at
        ",
    )
    .bind(id_to_i64("user_id", record.user_id.value())?)
    .bind(id_to_i64("course_id", record.course_id.value())?)
    .bind(id_to_i64("resource_id", record.resource_id.value())?)
    .bind(record.id.map(|id| id_to_i64("id", id)).transpose()?)
    .bind(i64::from(record.completed))
    .bind(record.completed_at)
    .bind(record.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(conn)?;
    Ok(())
}

async fn insert_attempt(
    tx: &mut Transaction<'_, Sqlite>,
    attempt: &AssessmentProgress,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO assessment_attempts (
            user_id, course_id, assessment_id, attempt_number, remote_id,
            score, max_score, percentage, passed, completed_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(user_id, course_id, assessment_id, attempt_number) DO UPDATE SET
            remote_id = COALESCE(excluded.remote_id, assessment_attempts.remote_id),
            score = excluded.score,
            max_score = excluded.max_score,
            percentage = excluded.percentage,
            passed = excluded.passed,
            completed_at = excluded.completed_at
        ",
    )
    .bind(id_to_i64("user_id", attempt.user_id.value())?)
    .bind(id_to_i64("course_id", attempt.course_id.value())?)
    .bind(id_to_i64("assessment_id", attempt.assessment_id.value())?)
    .bind(i64::from(attempt.attempt_number))
    .bind(attempt.id.map(|id| id_to_i64("id", id)).transpose()?)
    .bind(i64::from(attempt.score))
    .bind(i64::from(attempt.max_score))
    .bind(attempt.percentage)
    .bind(i64::from(attempt.passed))
    .bind(attempt.completed_at)
    .execute(&mut **tx)
    .await
    .map_err(conn)?;
    Ok(())
}

#[async_trait::async_trait]
impl ProgressCache for SqliteRepository {
    async fn module_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ModuleProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, course_id, resource_id, remote_id, completed, completed_at, updated_at
            FROM module_progress
            WHERE user_id = ?1 AND course_id = ?2
            ORDER BY resource_id ASC
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_module_row).collect()
    }

    async fn assessment_attempts(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<AssessmentProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, course_id, assessment_id, attempt_number, remote_id,
                   score, max_score, percentage, passed, completed_at
            FROM assessment_attempts
            WHERE user_id = ?1 AND course_id = ?2
            ORDER BY assessment_id ASC, attempt_number ASC
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_attempt_row).collect()
    }

    async fn replace_snapshot(
        &self,
        user_id: UserId,
        course_id: CourseId,
        modules: &[ModuleProgress],
        attempts: &[AssessmentProgress],
    ) -> Result<(), StorageError> {
        let user = id_to_i64("user_id", user_id.value())?;
        let course = id_to_i64("course_id", course_id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM module_progress WHERE user_id = ?1 AND course_id = ?2")
            .bind(user)
            .bind(course)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        sqlx::query("DELETE FROM assessment_attempts WHERE user_id = ?1 AND course_id = ?2")
            .bind(user)
            .bind(course)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        let (modules, attempts) = collapse_snapshot(modules, attempts);
        for record in &modules {
            insert_module(&mut tx, record).await?;
        }
        for attempt in &attempts {
            insert_attempt(&mut tx, attempt).await?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn upsert_module_progress(&self, record: &ModuleProgress) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        insert_module(&mut tx, record).await?;
        tx.commit().await.map_err(conn)
    }

    async fn record_attempt(&self, attempt: &AssessmentProgress) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        insert_attempt(&mut tx, attempt).await?;
        tx.commit().await.map_err(conn)
    }

    async fn purge_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), StorageError> {
        let user = id_to_i64("user_id", user_id.value())?;
        let course = id_to_i64("course_id", course_id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;
        sqlx::query("DELETE FROM module_progress WHERE user_id = ?1 AND course_id = ?2")
            .bind(user)
            .bind(course)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        sqlx::query("DELETE FROM assessment_attempts WHERE user_id = ?1 AND course_id = ?2")
            .bind(user)
            .bind(course)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        tx.commit().await.map_err(conn)
    }
}
