use talentdesk_core::hierarchy::MembershipSnapshot;

use crate::repositories::{MembershipRepository, RepositoryError};

/// Reads every membership row into an immutable snapshot for one request.
/// Nothing is cached between calls.
pub async fn load_snapshot(
    memberships: &dyn MembershipRepository,
) -> Result<MembershipSnapshot, RepositoryError> {
    let rows = memberships.list_all().await?;
    tracing::debug!(
        event_name = "db.snapshot.loaded",
        membership_count = rows.len(),
        "membership snapshot loaded"
    );
    Ok(MembershipSnapshot::new(rows))
}

#[cfg(test)]
mod tests {
    use talentdesk_core::domain::membership::{MemberRole, Membership};
    use talentdesk_core::hierarchy::MembershipStore;

    use super::load_snapshot;
    use crate::repositories::{InMemoryTeamRepository, MembershipRepository};

    #[tokio::test]
    async fn snapshot_reflects_latest_writes() {
        let repo = InMemoryTeamRepository::default();
        MembershipRepository::save(&repo, Membership::new("u-root", MemberRole::Admin, None))
            .await
            .expect("save root");

        let before = load_snapshot(&repo).await.expect("first snapshot");
        assert_eq!(before.len(), 1);

        MembershipRepository::save(
            &repo,
            Membership::new("u-sub", MemberRole::Admin, Some("u-root".into())),
        )
        .await
        .expect("save sub");

        let after = load_snapshot(&repo).await.expect("second snapshot");
        assert_eq!(after.len(), 2);
        assert_eq!(after.find_active_reports_of(&"u-root".into()).len(), 1);
        assert_eq!(before.len(), 1);
    }
}
