use chrono::{DateTime, Utc};
use lms_core::model::{Notification, NotificationId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_notification_row};
use crate::repository::{NotificationCache, StorageError};

#[async_trait::async_trait]
impl NotificationCache for SqliteRepository {
    async fn notifications(&self, user_id: UserId) -> Result<Vec<Notification>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, kind, title, message, created_at, read_at,
                   related_entity_id, related_entity_type
            FROM notifications
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_notification_row).collect()
    }

    async fn replace_notifications(
        &self,
        user_id: UserId,
        notifications: &[Notification],
    ) -> Result<(), StorageError> {
        let user = id_to_i64("user_id", user_id.value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM notifications WHERE user_id = ?1")
            .bind(user)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for n in notifications {
            sqlx::query(
                r"
                INSERT INTO notifications (
                    id, user_id, kind, title, message, created_at, read_at,
                    related_entity_id, related_entity_type
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(id) DO UPDATE SET
                    user_id = excluded.user_id,
                    kind = excluded.kind,
                    title = excluded.title,
                    message = excluded.message,
                    created_at = excluded.created_at,
                    read_at = excluded.read_at,
                    related_entity_id = excluded.related_entity_id,
                    related_entity_type = excluded.related_entity_type
                ",
            )
            .bind(id_to_i64("id", n.id.value())?)
            .bind(user)
            .bind(n.kind.as_str())
            .bind(n.title.as_str())
            .bind(n.message.as_str())
            .bind(n.created_at)
            .bind(n.read_at)
            .bind(
                n.related_entity_id
                    .map(|id| id_to_i64("related_entity_id", id))
                    .transpose()?,
            )
            .bind(n.related_entity_type.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)
    }

    async fn mark_read(&self, id: NotificationId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE notifications
            SET read_at = COALESCE(read_at, ?2)
            WHERE id = ?1
            ",
        )
        .bind(id_to_i64("id", id.value())?)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
