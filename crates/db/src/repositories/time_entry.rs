use chrono::NaiveDate;
use sqlx::{QueryBuilder, Row, Sqlite};

use talentdesk_core::domain::membership::UserId;
use talentdesk_core::domain::notification::Notification;
use talentdesk_core::domain::time_entry::{TimeEntry, TimeEntryId, TimeEntryStatus};

use super::notification::insert_notification;
use super::{decode_err, parse_timestamp, RepositoryError, TimeEntryRepository};
use crate::DbPool;

pub struct SqlTimeEntryRepository {
    pool: DbPool,
}

impl SqlTimeEntryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const TIME_ENTRY_COLUMNS: &str = "id, owner_id, work_date, minutes, description, status, \
     approved_by, approval_level, escalated, rejection_reason, decided_at, created_at, updated_at";

fn row_to_time_entry(row: &sqlx::sqlite::SqliteRow) -> Result<TimeEntry, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let owner_id: String = row.try_get("owner_id").map_err(decode_err)?;
    let work_date: String = row.try_get("work_date").map_err(decode_err)?;
    let minutes: i64 = row.try_get("minutes").map_err(decode_err)?;
    let description: String = row.try_get("description").map_err(decode_err)?;
    let status: String = row.try_get("status").map_err(decode_err)?;
    let approved_by: Option<String> = row.try_get("approved_by").map_err(decode_err)?;
    let approval_level: Option<i64> = row.try_get("approval_level").map_err(decode_err)?;
    let escalated: i64 = row.try_get("escalated").map_err(decode_err)?;
    let rejection_reason: Option<String> = row.try_get("rejection_reason").map_err(decode_err)?;
    let decided_at: Option<String> = row.try_get("decided_at").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    Ok(TimeEntry {
        id: TimeEntryId(id),
        owner_id: UserId(owner_id),
        work_date: NaiveDate::parse_from_str(&work_date, "%Y-%m-%d")
            .map_err(|error| RepositoryError::Decode(format!("work_date: {error}")))?,
        minutes: u32::try_from(minutes).map_err(decode_err)?,
        description,
        status: TimeEntryStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown entry status `{status}`")))?,
        approved_by: approved_by.map(UserId),
        approval_level: approval_level.map(u32::try_from).transpose().map_err(decode_err)?,
        escalated: escalated != 0,
        rejection_reason,
        decided_at: decided_at
            .as_deref()
            .map(|raw| parse_timestamp("decided_at", raw))
            .transpose()?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl TimeEntryRepository for SqlTimeEntryRepository {
    async fn find_by_id(&self, id: &TimeEntryId) -> Result<Option<TimeEntry>, RepositoryError> {
        let sql = format!("SELECT {TIME_ENTRY_COLUMNS} FROM time_entry WHERE id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;

        row.as_ref().map(row_to_time_entry).transpose()
    }

    async fn list_for_owners(
        &self,
        owners: &[UserId],
        status: Option<TimeEntryStatus>,
    ) -> Result<Vec<TimeEntry>, RepositoryError> {
        if owners.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<'_, Sqlite> = QueryBuilder::new(format!(
            "SELECT {TIME_ENTRY_COLUMNS} FROM time_entry WHERE owner_id IN ("
        ));
        let mut separated = query.separated(", ");
        for owner in owners {
            separated.push_bind(owner.as_str());
        }
        separated.push_unseparated(")");
        if let Some(status) = status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY work_date DESC, created_at DESC, id ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_time_entry).collect()
    }

    async fn submit(
        &self,
        entry: TimeEntry,
        notification: Option<Notification>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO time_entry ({TIME_ENTRY_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&entry.id.0)
        .bind(entry.owner_id.as_str())
        .bind(entry.work_date.format("%Y-%m-%d").to_string())
        .bind(i64::from(entry.minutes))
        .bind(&entry.description)
        .bind(entry.status.as_str())
        .bind(entry.approved_by.as_ref().map(UserId::as_str))
        .bind(entry.approval_level.map(i64::from))
        .bind(i64::from(entry.escalated))
        .bind(entry.rejection_reason.as_deref())
        .bind(entry.decided_at.map(|at| at.to_rfc3339()))
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        if let Some(notification) = &notification {
            insert_notification(&mut *tx, notification).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn apply_decision(
        &self,
        entry: TimeEntry,
        notification: Option<Notification>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE time_entry
             SET status = ?, approved_by = ?, approval_level = ?, escalated = ?,
                 rejection_reason = ?, decided_at = ?, updated_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(entry.status.as_str())
        .bind(entry.approved_by.as_ref().map(UserId::as_str))
        .bind(entry.approval_level.map(i64::from))
        .bind(i64::from(entry.escalated))
        .bind(entry.rejection_reason.as_deref())
        .bind(entry.decided_at.map(|at| at.to_rfc3339()))
        .bind(entry.updated_at.to_rfc3339())
        .bind(&entry.id.0)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound(format!("pending time entry {}", entry.id.0)));
        }

        if let Some(notification) = &notification {
            insert_notification(&mut *tx, notification).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use talentdesk_core::domain::membership::UserId;
    use talentdesk_core::domain::notification::{Notification, NotificationKind};
    use talentdesk_core::domain::time_entry::{TimeEntry, TimeEntryStatus};

    use super::SqlTimeEntryRepository;
    use crate::repositories::{
        NotificationRepository, RepositoryError, SqlNotificationRepository, TimeEntryRepository,
    };
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn entry(owner: &str, day: u32) -> TimeEntry {
        let date = NaiveDate::from_ymd_opt(2026, 3, day).expect("valid date");
        TimeEntry::new(owner, date, 240, "candidate screening")
    }

    fn decided(mut entry: TimeEntry, approver: &str) -> TimeEntry {
        let now = Utc::now();
        entry.status = TimeEntryStatus::Approved;
        entry.approved_by = Some(UserId::from(approver));
        entry.approval_level = Some(2);
        entry.escalated = true;
        entry.decided_at = Some(now);
        entry.updated_at = now;
        entry
    }

    #[tokio::test]
    async fn submit_round_trips_entry() {
        let repo = SqlTimeEntryRepository::new(setup().await);
        let submitted = entry("u-leaf", 2);

        repo.submit(submitted.clone(), None).await.expect("submit");
        let found = repo.find_by_id(&submitted.id).await.expect("find");

        assert_eq!(found, Some(submitted));
    }

    #[tokio::test]
    async fn list_for_owners_restricts_to_owner_set_and_status() {
        let repo = SqlTimeEntryRepository::new(setup().await);
        repo.submit(entry("u-leaf", 2), None).await.expect("leaf");
        repo.submit(entry("u-sub", 3), None).await.expect("sub");
        repo.submit(entry("u-outsider", 4), None).await.expect("outsider");
        let approved = decided(entry("u-leaf", 5), "u-root");
        repo.submit(approved, None).await.expect("approved");

        let owners = [UserId::from("u-leaf"), UserId::from("u-sub")];
        let all = repo.list_for_owners(&owners, None).await.expect("list all");
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|entry| owners.contains(&entry.owner_id)));

        let pending =
            repo.list_for_owners(&owners, Some(TimeEntryStatus::Pending)).await.expect("pending");
        assert_eq!(pending.len(), 2);
        assert!(repo.list_for_owners(&[], None).await.expect("empty").is_empty());
    }

    #[tokio::test]
    async fn decision_and_notification_are_written_together() {
        let pool = setup().await;
        let repo = SqlTimeEntryRepository::new(pool.clone());
        let notifications = SqlNotificationRepository::new(pool);
        let submitted = entry("u-leaf", 2);
        repo.submit(submitted.clone(), None).await.expect("submit");

        let approved = decided(submitted, "u-root");
        let notice = Notification::decision_recorded(&approved, Utc::now());
        repo.apply_decision(approved.clone(), notice).await.expect("decide");

        let stored = repo.find_by_id(&approved.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, TimeEntryStatus::Approved);
        assert_eq!(stored.approval_level, Some(2));
        assert!(stored.escalated);
        let inbox = notifications.list_for_recipient(&"u-leaf".into(), true).await.expect("inbox");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::TimeEntryApproved);
    }

    #[tokio::test]
    async fn failed_notification_rolls_back_decision() {
        let pool = setup().await;
        let repo = SqlTimeEntryRepository::new(pool.clone());
        let notifications = SqlNotificationRepository::new(pool);
        let submitted = entry("u-leaf", 2);
        repo.submit(submitted.clone(), None).await.expect("submit");

        let existing = Notification::new(
            UserId::from("u-leaf"),
            NotificationKind::TimeEntryApproved,
            submitted.id.0.clone(),
            "already sent",
            Utc::now(),
        );
        notifications.save(existing.clone()).await.expect("seed notification");

        let approved = decided(submitted.clone(), "u-root");
        let mut clashing = Notification::decision_recorded(&approved, Utc::now())
            .expect("decided entries produce a notice");
        clashing.id = existing.id;

        let result = repo.apply_decision(approved, Some(clashing)).await;
        assert!(matches!(result, Err(RepositoryError::Database(_))));

        let stored = repo.find_by_id(&submitted.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, TimeEntryStatus::Pending);
        assert!(stored.approved_by.is_none());
    }

    #[tokio::test]
    async fn deciding_twice_is_rejected() {
        let repo = SqlTimeEntryRepository::new(setup().await);
        let submitted = entry("u-leaf", 2);
        repo.submit(submitted.clone(), None).await.expect("submit");

        let approved = decided(submitted, "u-root");
        repo.apply_decision(approved.clone(), None).await.expect("first decision");

        let replay = repo.apply_decision(approved, None).await;
        assert!(matches!(replay, Err(RepositoryError::NotFound(_))));
    }
}
