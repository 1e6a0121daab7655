use sqlx::Row;

use talentdesk_core::domain::join_request::{JoinRequest, JoinRequestId, JoinRequestStatus};
use talentdesk_core::domain::membership::{MemberRole, Membership, UserId};
use talentdesk_core::domain::notification::Notification;

use super::membership::upsert_membership;
use super::notification::insert_notification;
use super::{decode_err, parse_timestamp, JoinRequestRepository, RepositoryError};
use crate::DbPool;

pub struct SqlJoinRequestRepository {
    pool: DbPool,
}

impl SqlJoinRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_join_request(row: &sqlx::sqlite::SqliteRow) -> Result<JoinRequest, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let user_id: String = row.try_get("user_id").map_err(decode_err)?;
    let requested_role: String = row.try_get("requested_role").map_err(decode_err)?;
    let status: String = row.try_get("status").map_err(decode_err)?;
    let decided_by: Option<String> = row.try_get("decided_by").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    Ok(JoinRequest {
        id: JoinRequestId(id),
        user_id: UserId(user_id),
        requested_role: requested_role.parse::<MemberRole>().map_err(decode_err)?,
        status: JoinRequestStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown join status `{status}`")))?,
        decided_by: decided_by.map(UserId),
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

async fn upsert_join_request<'e, E>(
    executor: E,
    request: &JoinRequest,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO join_request (id, user_id, requested_role, status, decided_by, created_at,
                                   updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             requested_role = excluded.requested_role,
             status = excluded.status,
             decided_by = excluded.decided_by,
             updated_at = excluded.updated_at",
    )
    .bind(&request.id.0)
    .bind(request.user_id.as_str())
    .bind(request.requested_role.as_str())
    .bind(request.status.as_str())
    .bind(request.decided_by.as_ref().map(UserId::as_str))
    .bind(request.created_at.to_rfc3339())
    .bind(request.updated_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl JoinRequestRepository for SqlJoinRequestRepository {
    async fn find_by_id(
        &self,
        id: &JoinRequestId,
    ) -> Result<Option<JoinRequest>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, requested_role, status, decided_by, created_at, updated_at
             FROM join_request WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_join_request).transpose()
    }

    async fn list_pending(&self) -> Result<Vec<JoinRequest>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, requested_role, status, decided_by, created_at, updated_at
             FROM join_request
             WHERE status = 'pending'
             ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_join_request).collect()
    }

    async fn save(&self, request: JoinRequest) -> Result<(), RepositoryError> {
        upsert_join_request(&self.pool, &request).await
    }

    async fn apply_approval(
        &self,
        request: JoinRequest,
        membership: Membership,
        notification: Notification,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE join_request SET status = ?, decided_by = ?, updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(request.status.as_str())
        .bind(request.decided_by.as_ref().map(UserId::as_str))
        .bind(request.updated_at.to_rfc3339())
        .bind(&request.id.0)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound(format!(
                "pending join request {}",
                request.id.0
            )));
        }

        upsert_membership(&mut *tx, &membership).await?;
        insert_notification(&mut *tx, &notification).await?;
        tx.commit().await?;
        Ok(())
    }
}
