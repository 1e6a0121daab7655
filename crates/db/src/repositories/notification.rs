use sqlx::Row;

use talentdesk_core::domain::membership::UserId;
use talentdesk_core::domain::notification::{Notification, NotificationId, NotificationKind};

use super::{decode_err, parse_timestamp, NotificationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_notification(row: &sqlx::sqlite::SqliteRow) -> Result<Notification, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let recipient_id: String = row.try_get("recipient_id").map_err(decode_err)?;
    let kind: String = row.try_get("kind").map_err(decode_err)?;
    let subject_id: String = row.try_get("subject_id").map_err(decode_err)?;
    let message: String = row.try_get("message").map_err(decode_err)?;
    let is_read: i64 = row.try_get("is_read").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;

    Ok(Notification {
        id: NotificationId(id),
        recipient_id: UserId(recipient_id),
        kind: NotificationKind::parse(&kind).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown notification kind `{kind}`"))
        })?,
        subject_id,
        message,
        read: is_read != 0,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

pub(crate) async fn insert_notification<'e, E>(
    executor: E,
    notification: &Notification,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO notification (id, recipient_id, kind, subject_id, message, is_read,
                                   created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&notification.id.0)
    .bind(notification.recipient_id.as_str())
    .bind(notification.kind.as_str())
    .bind(&notification.subject_id)
    .bind(&notification.message)
    .bind(i64::from(notification.read))
    .bind(notification.created_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn list_for_recipient(
        &self,
        recipient_id: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, recipient_id, kind, subject_id, message, is_read, created_at
             FROM notification
             WHERE recipient_id = ? AND (? = 0 OR is_read = 0)
             ORDER BY created_at DESC, id ASC",
        )
        .bind(recipient_id.as_str())
        .bind(i64::from(unread_only))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_notification).collect()
    }

    async fn save(&self, notification: Notification) -> Result<(), RepositoryError> {
        insert_notification(&self.pool, &notification).await
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE notification SET is_read = 1 WHERE id = ? AND is_read = 0")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
