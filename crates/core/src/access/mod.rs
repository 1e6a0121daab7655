use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::membership::{Membership, UserId};
use crate::domain::record::RecordId;
use crate::errors::DomainError;
use crate::hierarchy::{HierarchyLimits, HierarchyResolver, MembershipStore};
use crate::requests::{BulkAction, BulkRecordRequest, DEFAULT_MAX_BULK_RECORDS};

/// Owners whose records a caller may read or write, computed per request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilitySet {
    pub ids: BTreeSet<UserId>,
    pub is_admin: bool,
    pub hierarchy_level: u32,
}

impl VisibilitySet {
    pub fn self_only(user_id: &UserId) -> Self {
        Self { ids: BTreeSet::from([user_id.clone()]), is_admin: false, hierarchy_level: 0 }
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.ids.contains(user_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPartition<T> {
    pub accessible: Vec<T>,
    pub denied: Vec<T>,
}

impl<T> AccessPartition<T> {
    pub fn is_fully_accessible(&self) -> bool {
        self.denied.is_empty()
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("user `{user_id}` has no active team membership")]
    NoActiveMembership { user_id: UserId },
    #[error("user `{user_id}` must be an active admin for this operation")]
    AdminRequired { user_id: UserId },
    #[error("user `{caller_id}` cannot act on `{target_id}`, who is outside their team")]
    OutsideTeam { caller_id: UserId, target_id: UserId },
    #[error("user `{caller_id}` cannot access {} record(s) owned outside their team", .denied.len())]
    Denied { caller_id: UserId, denied: Vec<RecordId> },
    #[error("user `{approver_id}` cannot approve entries submitted by `{submitter_id}`")]
    NotApprover { approver_id: UserId, submitter_id: UserId },
}

/// Answers "whose records may this caller see" and "may this caller act on
/// that owner" for every record-scoped handler.
///
/// Callers without an active membership fall back to their own records on
/// read paths; write paths go through `require_membership`/`require_admin`
/// and reject the whole request instead.
#[derive(Clone)]
pub struct AccessAuthority<S> {
    resolver: HierarchyResolver<S>,
    audit: Option<Arc<dyn AuditSink>>,
    correlation_id: String,
    max_bulk_records: usize,
}

impl<S> AccessAuthority<S>
where
    S: MembershipStore,
{
    pub fn new(store: S, limits: HierarchyLimits) -> Self {
        Self {
            resolver: HierarchyResolver::new(store, limits),
            audit: None,
            correlation_id: "unassigned".to_owned(),
            max_bulk_records: DEFAULT_MAX_BULK_RECORDS,
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    pub fn with_bulk_limit(mut self, max_bulk_records: usize) -> Self {
        self.max_bulk_records = max_bulk_records;
        self
    }

    pub fn resolver(&self) -> &HierarchyResolver<S> {
        &self.resolver
    }

    pub fn visible_owner_ids(&self, caller: &UserId) -> VisibilitySet {
        let Some(membership) = self.active_membership(caller) else {
            debug!(
                event_name = "access.visibility.self_only",
                correlation_id = %self.correlation_id,
                caller = %caller,
                reason = "no_active_membership",
                "caller limited to own records"
            );
            return VisibilitySet::self_only(caller);
        };

        if !membership.is_admin() {
            return VisibilitySet::self_only(caller);
        }

        let ids = self.resolver.resolve_team(caller);
        let hierarchy_level = if membership.is_root_admin() { 0 } else { 1 };
        debug!(
            event_name = "access.visibility.team",
            correlation_id = %self.correlation_id,
            caller = %caller,
            team_size = ids.len(),
            hierarchy_level,
            "resolved admin visibility"
        );
        VisibilitySet { ids, is_admin: true, hierarchy_level }
    }

    pub fn can_access(&self, caller: &UserId, target: &UserId) -> bool {
        if caller == target {
            return true;
        }

        let allowed = self.visible_owner_ids(caller).contains(target);
        if !allowed {
            self.record_denial(caller, "access.owner_denied", Some(target.to_string()), &[]);
        }
        allowed
    }

    pub fn check_access(&self, caller: &UserId, target: &UserId) -> Result<(), AccessError> {
        if self.can_access(caller, target) {
            Ok(())
        } else {
            Err(AccessError::OutsideTeam { caller_id: caller.clone(), target_id: target.clone() })
        }
    }

    /// Splits `ids` by whether the caller can see each record's owner.
    /// Records whose owner cannot be resolved land in `denied`. Input order
    /// is preserved within each side.
    pub fn filter_accessible_record_ids<T, F>(
        &self,
        ids: &[T],
        caller: &UserId,
        owner_of: F,
    ) -> AccessPartition<T>
    where
        T: Clone,
        F: Fn(&T) -> Option<UserId>,
    {
        let visibility = self.visible_owner_ids(caller);
        let (accessible, denied): (Vec<T>, Vec<T>) = ids.iter().cloned().partition(|id| {
            owner_of(id).is_some_and(|owner| owner == *caller || visibility.contains(&owner))
        });
        AccessPartition { accessible, denied }
    }

    pub fn require_membership(&self, caller: &UserId) -> Result<Membership, AccessError> {
        match self.active_membership(caller) {
            Some(membership) => Ok(membership),
            None => {
                self.record_denial(caller, "access.membership_required", None, &[]);
                Err(AccessError::NoActiveMembership { user_id: caller.clone() })
            }
        }
    }

    pub fn require_admin(&self, caller: &UserId) -> Result<Membership, AccessError> {
        let membership = self.require_membership(caller)?;
        if membership.is_admin() {
            return Ok(membership);
        }

        self.record_denial(caller, "access.admin_required", None, &[]);
        Err(AccessError::AdminRequired { user_id: caller.clone() })
    }

    /// All-or-nothing gate for a bulk mutation: either every record (and any
    /// reassignment target) is in scope, or nothing is returned.
    ///
    /// Malformed batches (empty, duplicated, blank or over the configured
    /// size) are rejected before any ownership lookup.
    pub fn authorize_bulk<F>(
        &self,
        request: &BulkRecordRequest,
        caller: &UserId,
        owner_of: F,
    ) -> Result<Vec<RecordId>, DomainError>
    where
        F: Fn(&RecordId) -> Option<UserId>,
    {
        request.validate(self.max_bulk_records)?;
        self.require_membership(caller)?;

        let partition = self.filter_accessible_record_ids(&request.record_ids, caller, owner_of);
        if !partition.is_fully_accessible() {
            self.record_denial(
                caller,
                "access.bulk_denied",
                None,
                &[
                    ("kind", request.kind.as_str().to_owned()),
                    ("action", request.action.name().to_owned()),
                    ("denied_count", partition.denied.len().to_string()),
                ],
            );
            let denied = partition.denied;
            return Err(AccessError::Denied { caller_id: caller.clone(), denied }.into());
        }

        if let BulkAction::Reassign { new_owner_id } = &request.action {
            self.check_access(caller, new_owner_id)?;
        }

        Ok(partition.accessible)
    }

    fn active_membership(&self, user_id: &UserId) -> Option<Membership> {
        self.resolver.store().find_membership(user_id).filter(|membership| membership.is_active)
    }

    fn record_denial(
        &self,
        caller: &UserId,
        event_type: &str,
        subject_id: Option<String>,
        metadata: &[(&str, String)],
    ) {
        warn!(
            event_name = event_type,
            correlation_id = %self.correlation_id,
            caller = %caller,
            subject_id = subject_id.as_deref().unwrap_or("none"),
            "access denied"
        );

        if let Some(sink) = &self.audit {
            let event = metadata.iter().fold(
                AuditEvent::new(
                    subject_id,
                    self.correlation_id.clone(),
                    event_type,
                    AuditCategory::Access,
                    caller.clone(),
                    AuditOutcome::Rejected,
                ),
                |event, (key, value)| event.with_metadata(*key, value.clone()),
            );
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    use super::{AccessAuthority, AccessError, VisibilitySet};
    use crate::audit::{AuditOutcome, InMemoryAuditSink};
    use crate::domain::membership::{MemberRole, Membership, UserId};
    use crate::domain::record::{RecordId, RecordKind};
    use crate::errors::DomainError;
    use crate::hierarchy::{HierarchyLimits, MembershipSnapshot};
    use crate::requests::{BulkAction, BulkRecordRequest};

    fn ids(raw: &[&str]) -> BTreeSet<UserId> {
        raw.iter().map(|id| UserId::from(*id)).collect()
    }

    fn agency() -> MembershipSnapshot {
        MembershipSnapshot::new(vec![
            Membership::new("root", MemberRole::Admin, None),
            Membership::new("sub", MemberRole::Admin, Some(UserId::from("root"))),
            Membership::new("leaf", MemberRole::Contributor, Some(UserId::from("sub"))),
            Membership::new("peer", MemberRole::Contributor, Some(UserId::from("root"))),
            Membership::new("gone", MemberRole::Admin, Some(UserId::from("root"))).deactivated(),
            Membership::new("other-root", MemberRole::Admin, None),
            Membership::new("other-leaf", MemberRole::Contributor, Some("other-root".into())),
        ])
    }

    fn authority(snapshot: &MembershipSnapshot) -> AccessAuthority<&MembershipSnapshot> {
        AccessAuthority::new(snapshot, HierarchyLimits::default())
    }

    fn owners() -> HashMap<RecordId, UserId> {
        HashMap::from([
            (RecordId::from("cand-1"), UserId::from("leaf")),
            (RecordId::from("cand-2"), UserId::from("sub")),
            (RecordId::from("cand-3"), UserId::from("other-leaf")),
        ])
    }

    #[test]
    fn root_admin_sees_whole_active_tree() {
        let snapshot = agency();
        let visibility = authority(&snapshot).visible_owner_ids(&"root".into());

        assert_eq!(visibility.ids, ids(&["root", "sub", "leaf", "peer"]));
        assert!(visibility.is_admin);
        assert_eq!(visibility.hierarchy_level, 0);
    }

    #[test]
    fn sub_admin_sees_own_subtree_at_level_one() {
        let snapshot = agency();
        let visibility = authority(&snapshot).visible_owner_ids(&"sub".into());

        assert_eq!(visibility.ids, ids(&["sub", "leaf"]));
        assert_eq!(visibility.hierarchy_level, 1);
    }

    #[test]
    fn contributor_and_unknown_users_see_only_themselves() {
        let snapshot = agency();
        let authority = authority(&snapshot);

        assert_eq!(
            authority.visible_owner_ids(&"leaf".into()),
            VisibilitySet::self_only(&"leaf".into())
        );
        let stranger = authority.visible_owner_ids(&"stranger".into());
        assert_eq!(stranger.ids, ids(&["stranger"]));
        assert!(!stranger.is_admin);
    }

    #[test]
    fn deactivated_admin_falls_back_to_self_only() {
        let snapshot = agency();
        let visibility = authority(&snapshot).visible_owner_ids(&"gone".into());

        assert_eq!(visibility, VisibilitySet::self_only(&"gone".into()));
    }

    #[test]
    fn can_access_self_regardless_of_membership() {
        let snapshot = MembershipSnapshot::default();
        let authority = authority(&snapshot);

        assert!(authority.can_access(&"nobody".into(), &"nobody".into()));
    }

    #[test]
    fn can_access_follows_team_boundaries() {
        let snapshot = agency();
        let authority = authority(&snapshot);

        assert!(authority.can_access(&"root".into(), &"leaf".into()));
        assert!(authority.can_access(&"sub".into(), &"leaf".into()));
        assert!(!authority.can_access(&"sub".into(), &"peer".into()));
        assert!(!authority.can_access(&"leaf".into(), &"sub".into()));
        assert!(!authority.can_access(&"root".into(), &"other-leaf".into()));
    }

    #[test]
    fn partition_keeps_order_and_denies_unknown_owners() {
        let snapshot = agency();
        let owners = owners();
        let records: Vec<RecordId> = ["cand-3", "cand-1", "cand-missing", "cand-2"]
            .into_iter()
            .map(RecordId::from)
            .collect();

        let partition = authority(&snapshot).filter_accessible_record_ids(
            &records,
            &"sub".into(),
            |id| owners.get(id).cloned(),
        );

        assert_eq!(partition.accessible, vec![RecordId::from("cand-1"), RecordId::from("cand-2")]);
        assert_eq!(
            partition.denied,
            vec![RecordId::from("cand-3"), RecordId::from("cand-missing")]
        );
        assert!(!partition.is_fully_accessible());
    }

    #[test]
    fn bulk_authorization_is_all_or_nothing_and_audited() {
        let snapshot = agency();
        let owners = owners();
        let sink = InMemoryAuditSink::default();
        let authority = authority(&snapshot)
            .with_audit_sink(Arc::new(sink.clone()))
            .with_correlation_id("req-bulk");
        let request = BulkRecordRequest {
            kind: RecordKind::Candidate,
            record_ids: vec![RecordId::from("cand-1"), RecordId::from("cand-3")],
            action: BulkAction::Delete,
        };

        let error = authority
            .authorize_bulk(&request, &"root".into(), |id| owners.get(id).cloned())
            .expect_err("cross-team record must reject the whole batch");

        assert_eq!(
            error,
            DomainError::Access(AccessError::Denied {
                caller_id: "root".into(),
                denied: vec![RecordId::from("cand-3")],
            })
        );
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "access.bulk_denied");
        assert_eq!(events[0].outcome, AuditOutcome::Rejected);
        assert_eq!(events[0].correlation_id, "req-bulk");
    }

    #[test]
    fn bulk_authorization_requires_membership_even_for_own_records() {
        let snapshot = agency();
        let request = BulkRecordRequest {
            kind: RecordKind::Resume,
            record_ids: vec![RecordId::from("res-1")],
            action: BulkAction::Delete,
        };

        let error = authority(&snapshot)
            .authorize_bulk(&request, &"stranger".into(), |_| Some("stranger".into()))
            .expect_err("caller without membership is rejected");

        assert_eq!(
            error,
            DomainError::Access(AccessError::NoActiveMembership { user_id: "stranger".into() })
        );
    }

    #[test]
    fn malformed_bulk_batches_are_rejected_before_ownership_checks() {
        let snapshot = agency();
        let owners = owners();
        let sink = InMemoryAuditSink::default();
        let authority = authority(&snapshot)
            .with_audit_sink(Arc::new(sink.clone()))
            .with_bulk_limit(3);
        let owner_of = |id: &RecordId| owners.get(id).cloned();

        let empty = BulkRecordRequest {
            kind: RecordKind::Candidate,
            record_ids: Vec::new(),
            action: BulkAction::UpdateStatus { status: " ".to_owned() },
        };
        let duplicated = BulkRecordRequest {
            kind: RecordKind::Candidate,
            record_ids: vec![RecordId::from("cand-1"); 3],
            action: BulkAction::Delete,
        };
        let oversized = BulkRecordRequest {
            kind: RecordKind::Candidate,
            record_ids: (0..4).map(|n| RecordId::from(format!("cand-{n}").as_str())).collect(),
            action: BulkAction::Delete,
        };

        for request in [empty, duplicated, oversized] {
            let error = authority
                .authorize_bulk(&request, &"root".into(), owner_of)
                .expect_err("malformed batch must be rejected");
            assert!(matches!(error, DomainError::InvalidRequest(_)), "got {error:?}");
        }
        assert!(sink.events().is_empty());
    }

    #[test]
    fn bulk_reassignment_target_must_be_in_scope() {
        let snapshot = agency();
        let owners = owners();
        let request = BulkRecordRequest {
            kind: RecordKind::Candidate,
            record_ids: vec![RecordId::from("cand-1")],
            action: BulkAction::Reassign { new_owner_id: "other-leaf".into() },
        };

        let error = authority(&snapshot)
            .authorize_bulk(&request, &"root".into(), |id| owners.get(id).cloned())
            .expect_err("reassigning outside the team is rejected");
        assert!(matches!(error, DomainError::Access(AccessError::OutsideTeam { .. })));

        let in_scope = BulkRecordRequest {
            action: BulkAction::Reassign { new_owner_id: "peer".into() },
            ..request
        };
        let allowed = authority(&snapshot)
            .authorize_bulk(&in_scope, &"root".into(), |id| owners.get(id).cloned())
            .expect("reassignment inside the team is allowed");
        assert_eq!(allowed, vec![RecordId::from("cand-1")]);
    }

    #[test]
    fn admin_requirement_rejects_contributors() {
        let snapshot = agency();
        let authority = authority(&snapshot);

        assert!(authority.require_admin(&"sub".into()).is_ok());
        assert_eq!(
            authority.require_admin(&"leaf".into()),
            Err(AccessError::AdminRequired { user_id: "leaf".into() })
        );
        assert_eq!(
            authority.require_admin(&"gone".into()),
            Err(AccessError::NoActiveMembership { user_id: "gone".into() })
        );
    }
}
