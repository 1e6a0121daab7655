use serde::Serialize;
use sqlx::Executor;

use talentdesk_core::domain::membership::UserId;
use talentdesk_core::escalation::EscalationRouter;
use talentdesk_core::hierarchy::{HierarchyLimits, MembershipStore};

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlMembershipRepository};
use crate::snapshot::load_snapshot;

/// Membership rows the fixture promises to create.
const SEED_MEMBERS: &[SeedMember] = &[
    SeedMember { user_id: "demo-root", role: "admin", manager_id: None, is_active: true },
    SeedMember {
        user_id: "demo-sub",
        role: "admin",
        manager_id: Some("demo-root"),
        is_active: true,
    },
    SeedMember {
        user_id: "demo-leaf",
        role: "contributor",
        manager_id: Some("demo-sub"),
        is_active: true,
    },
    SeedMember {
        user_id: "demo-ops-lead",
        role: "admin",
        manager_id: Some("demo-root"),
        is_active: false,
    },
    SeedMember {
        user_id: "demo-ops-recruiter",
        role: "contributor",
        manager_id: Some("demo-ops-lead"),
        is_active: true,
    },
    SeedMember { user_id: "demo-orphan-head", role: "admin", manager_id: None, is_active: false },
    SeedMember {
        user_id: "demo-orphan",
        role: "contributor",
        manager_id: Some("demo-orphan-head"),
        is_active: true,
    },
];

/// Escalation outcomes the seeded hierarchy must produce.
const SEED_SCENARIOS: &[EscalationScenario] = &[
    EscalationScenario {
        name: "direct-manager",
        submitter: "demo-leaf",
        expected_manager: Some("demo-sub"),
        expected_level: 1,
        description: "Active admin manager approves directly",
    },
    EscalationScenario {
        name: "skip-inactive-manager",
        submitter: "demo-ops-recruiter",
        expected_manager: Some("demo-root"),
        expected_level: 2,
        description: "Deactivated manager is skipped; root approves at level 2",
    },
    EscalationScenario {
        name: "no-approver",
        submitter: "demo-orphan",
        expected_manager: None,
        expected_level: 0,
        description: "Chain ends without an active admin",
    },
];

const SEED_JOIN_REQUEST_IDS: &[&str] = &["jr-demo-001"];

const SEED_TIME_ENTRY_IDS: &[&str] = &["te-demo-001", "te-demo-002"];

const SEED_NOTIFICATION_IDS: &[&str] = &["ntf-demo-001", "ntf-demo-002"];

/// Deterministic agency hierarchy covering direct approval, escalation past a
/// deactivated manager, and a chain with no approver.
pub struct DemoAgencyDataset;

impl DemoAgencyDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_agency.sql");

    /// Loads the fixture. Rows that already exist are left as they are.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        tracing::info!(
            event_name = "db.fixtures.loaded",
            members = SEED_MEMBERS.len(),
            scenarios = SEED_SCENARIOS.len(),
            "demo agency fixture loaded"
        );

        Ok(SeedResult {
            members_seeded: SEED_MEMBERS.len(),
            scenarios: SEED_SCENARIOS
                .iter()
                .map(|scenario| ScenarioSeedInfo {
                    name: scenario.name,
                    submitter: scenario.submitter,
                    description: scenario.description,
                })
                .collect(),
        })
    }

    /// Checks that every seeded row is present and that the escalation walk
    /// over the stored hierarchy still yields the promised approvers.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for member in SEED_MEMBERS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                     SELECT 1 FROM team_membership
                     WHERE user_id = ?1 AND role = ?2 AND is_active = ?3
                       AND manager_id IS ?4
                 )",
            )
            .bind(member.user_id)
            .bind(member.role)
            .bind(i64::from(member.is_active))
            .bind(member.manager_id)
            .fetch_one(pool)
            .await?;
            checks.push((member.user_id, present == 1));
        }

        for (label, table, ids) in [
            ("join-requests", "join_request", SEED_JOIN_REQUEST_IDS),
            ("time-entries", "time_entry", SEED_TIME_ENTRY_IDS),
            ("notifications", "notification", SEED_NOTIFICATION_IDS),
        ] {
            checks.push((label, count_ids(pool, table, ids).await?));
        }

        let snapshot = load_snapshot(&SqlMembershipRepository::new(pool.clone())).await?;
        let router = EscalationRouter::new(&snapshot, HierarchyLimits::default());
        for scenario in SEED_SCENARIOS {
            let target = router.find_available_manager(&UserId::from(scenario.submitter));
            let resolved = match (scenario.expected_manager, target) {
                (None, None) => true,
                (Some(expected), Some(target)) => {
                    target.manager_id.as_str() == expected
                        && target.level == scenario.expected_level
                        && target.escalated == (scenario.expected_level > 1)
                }
                _ => false,
            };
            checks.push((scenario.name, resolved));
        }

        let submitters_known = SEED_SCENARIOS
            .iter()
            .all(|scenario| snapshot.find_membership(&UserId::from(scenario.submitter)).is_some());
        checks.push(("scenario-submitters", submitters_known));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes every seeded row.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let members = SEED_MEMBERS.iter().map(|member| member.user_id).collect::<Vec<_>>();
        sqlx::query(&format!(
            "DELETE FROM notification WHERE id IN {}",
            sql_array_from_ids(SEED_NOTIFICATION_IDS)
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM time_entry WHERE id IN {}",
            sql_array_from_ids(SEED_TIME_ENTRY_IDS)
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM join_request WHERE id IN {}",
            sql_array_from_ids(SEED_JOIN_REQUEST_IDS)
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query(&format!(
            "DELETE FROM team_membership WHERE user_id IN {}",
            sql_array_from_ids(&members)
        ))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn count_ids(pool: &DbPool, table: &str, ids: &[&str]) -> Result<bool, RepositoryError> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(1) FROM {table} WHERE id IN {}",
        sql_array_from_ids(ids)
    ))
    .fetch_one(pool)
    .await?;
    Ok(usize::try_from(count).is_ok_and(|count| count == ids.len()))
}

// Only ever called with the fixture's own constant ids.
fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Clone, Copy)]
struct SeedMember {
    user_id: &'static str,
    role: &'static str,
    manager_id: Option<&'static str>,
    is_active: bool,
}

#[derive(Debug, Clone, Copy)]
struct EscalationScenario {
    name: &'static str,
    submitter: &'static str,
    expected_manager: Option<&'static str>,
    expected_level: u32,
    description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub members_seeded: usize,
    pub scenarios: Vec<ScenarioSeedInfo>,
}

#[derive(Debug, Serialize)]
pub struct ScenarioSeedInfo {
    pub name: &'static str,
    pub submitter: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[test]
    fn sql_fixture_mentions_every_seeded_member() {
        for member in SEED_MEMBERS {
            assert!(
                DemoAgencyDataset::SQL.contains(&format!("'{}'", member.user_id)),
                "fixture is missing {}",
                member.user_id
            );
        }
    }

    #[tokio::test]
    async fn load_is_idempotent_and_verifies() {
        let pool = setup().await;

        let first = DemoAgencyDataset::load(&pool).await.expect("load");
        let first_verification = DemoAgencyDataset::verify(&pool).await.expect("verify");
        assert!(first_verification.all_present, "{:?}", first_verification.checks);
        assert_eq!(first.members_seeded, SEED_MEMBERS.len());
        assert_eq!(first.scenarios.len(), 3);

        DemoAgencyDataset::load(&pool).await.expect("reload");
        let second_verification = DemoAgencyDataset::verify(&pool).await.expect("re-verify");
        assert_eq!(first_verification.checks, second_verification.checks);

        let members: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM team_membership")
            .fetch_one(&pool)
            .await
            .expect("count members");
        assert_eq!(members, SEED_MEMBERS.len() as i64);
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows_and_fails_verification() {
        let pool = setup().await;
        DemoAgencyDataset::load(&pool).await.expect("load");

        DemoAgencyDataset::clean(&pool).await.expect("clean");

        let verification = DemoAgencyDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM time_entry")
            .fetch_one(&pool)
            .await
            .expect("count entries");
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn reactivated_manager_breaks_the_escalation_scenario() {
        let pool = setup().await;
        DemoAgencyDataset::load(&pool).await.expect("load");

        sqlx::query("UPDATE team_membership SET is_active = 1 WHERE user_id = 'demo-ops-lead'")
            .execute(&pool)
            .await
            .expect("reactivate");

        let verification = DemoAgencyDataset::verify(&pool).await.expect("verify");
        let failed: Vec<&str> =
            verification.checks.iter().filter(|(_, ok)| !ok).map(|(name, _)| *name).collect();
        assert_eq!(failed, vec!["demo-ops-lead", "skip-inactive-manager"]);
    }
}
