use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_session_row};
use crate::repository::{SessionRepository, StorageError, StoredSession};

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn load_session(&self) -> Result<Option<StoredSession>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, name, email, username, role, token, saved_at
            FROM session WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn save_session(&self, session: &StoredSession) -> Result<(), StorageError> {
        let user = &session.user;
        sqlx::query(
            r"
            INSERT INTO session (id, user_id, name, email, username, role, token, saved_at)
            VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                name = excluded.name,
                email = excluded.email,
                username = excluded.username,
                role = excluded.role,
                token = excluded.token,
                saved_at = excluded.saved_at
            ",
        )
        .bind(id_to_i64("user_id", user.id.value())?)
        .bind(user.name.as_str())
        .bind(user.email.as_deref())
        .bind(user.username.as_deref())
        .bind(user.role.as_deref())
        .bind(session.token.as_str())
        .bind(session.saved_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM session WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
