use sqlx::Row;

use talentdesk_core::domain::membership::{MemberRole, Membership, MembershipId, UserId};

use super::{decode_err, parse_timestamp, MembershipRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMembershipRepository {
    pool: DbPool,
}

impl SqlMembershipRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_MEMBERSHIP: &str = "SELECT id, user_id, is_active, role, manager_id, created_at, \
     updated_at FROM team_membership";

pub(crate) fn row_to_membership(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Membership, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let user_id: String = row.try_get("user_id").map_err(decode_err)?;
    let is_active: i64 = row.try_get("is_active").map_err(decode_err)?;
    let role: String = row.try_get("role").map_err(decode_err)?;
    let manager_id: Option<String> = row.try_get("manager_id").map_err(decode_err)?;
    let created_at: String = row.try_get("created_at").map_err(decode_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_err)?;

    Ok(Membership {
        id: MembershipId(id),
        user_id: UserId(user_id),
        is_active: is_active != 0,
        role: role.parse::<MemberRole>().map_err(decode_err)?,
        manager_id: manager_id.map(UserId),
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

pub(crate) async fn upsert_membership<'e, E>(
    executor: E,
    membership: &Membership,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT INTO team_membership (id, user_id, is_active, role, manager_id, created_at,
                                      updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET
             is_active = excluded.is_active,
             role = excluded.role,
             manager_id = excluded.manager_id,
             updated_at = excluded.updated_at",
    )
    .bind(&membership.id.0)
    .bind(membership.user_id.as_str())
    .bind(i64::from(membership.is_active))
    .bind(membership.role.as_str())
    .bind(membership.manager_id.as_ref().map(UserId::as_str))
    .bind(membership.created_at.to_rfc3339())
    .bind(membership.updated_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl MembershipRepository for SqlMembershipRepository {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Membership>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_MEMBERSHIP} WHERE user_id = ?"))
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_membership).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Membership>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_MEMBERSHIP} ORDER BY user_id ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_membership).collect()
    }

    async fn save(&self, membership: Membership) -> Result<(), RepositoryError> {
        upsert_membership(&self.pool, &membership).await
    }
}

#[cfg(test)]
mod tests {
    use talentdesk_core::domain::membership::{MemberRole, Membership, UserId};

    use super::SqlMembershipRepository;
    use crate::repositories::MembershipRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn save_and_find_by_user() {
        let repo = SqlMembershipRepository::new(setup().await);
        let membership = Membership::new("u-sub", MemberRole::Admin, Some(UserId::from("u-root")));

        repo.save(membership.clone()).await.expect("save");
        let found = repo.find_by_user(&"u-sub".into()).await.expect("find").expect("exists");

        assert_eq!(found.id, membership.id);
        assert_eq!(found.role, MemberRole::Admin);
        assert_eq!(found.manager_id, Some(UserId::from("u-root")));
        assert!(found.is_active);
        assert!(repo.find_by_user(&"u-missing".into()).await.expect("find").is_none());
    }

    #[tokio::test]
    async fn save_upserts_on_user_id() {
        let repo = SqlMembershipRepository::new(setup().await);
        let membership = Membership::new("u-leaf", MemberRole::Contributor, None);
        repo.save(membership.clone()).await.expect("save");

        let mut moved = membership.deactivated();
        moved.manager_id = Some(UserId::from("u-other"));
        repo.save(moved).await.expect("upsert");

        let all = repo.list_all().await.expect("list");
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active);
        assert_eq!(all[0].manager_id, Some(UserId::from("u-other")));
    }

    #[tokio::test]
    async fn list_all_is_ordered_and_includes_inactive() {
        let repo = SqlMembershipRepository::new(setup().await);
        repo.save(Membership::new("u-c", MemberRole::Contributor, None)).await.expect("save c");
        repo.save(Membership::new("u-a", MemberRole::Admin, None).deactivated())
            .await
            .expect("save a");
        repo.save(Membership::new("u-b", MemberRole::Admin, None)).await.expect("save b");

        let users: Vec<String> = repo
            .list_all()
            .await
            .expect("list")
            .into_iter()
            .map(|membership| membership.user_id.0)
            .collect();

        assert_eq!(users, vec!["u-a", "u-b", "u-c"]);
    }
}
