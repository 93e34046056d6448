use std::collections::HashSet;

use chrono::{DateTime, Utc};
use lms_core::model::{AnnouncementId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, ser};
use crate::repository::{ReadReceiptRepository, StorageError};

#[async_trait::async_trait]
impl ReadReceiptRepository for SqliteRepository {
    async fn mark_announcement_read(
        &self,
        user_id: UserId,
        announcement_id: AnnouncementId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO announcement_receipts (user_id, announcement_id, read_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(user_id, announcement_id) DO NOTHING
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("announcement_id", announcement_id.value())?)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn read_announcements(
        &self,
        user_id: UserId,
    ) -> Result<HashSet<AnnouncementId>, StorageError> {
        let rows = sqlx::query("SELECT announcement_id FROM announcement_receipts WHERE user_id = ?1")
            .bind(id_to_i64("user_id", user_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter()
            .map(|row| {
                let raw: i64 = row.try_get("announcement_id").map_err(ser)?;
                u64::try_from(raw)
                    .map(AnnouncementId::new)
                    .map_err(|_| StorageError::Serialization("announcement_id sign overflow".into()))
            })
            .collect()
    }
}
