use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use talentdesk_core::access::{AccessAuthority, VisibilitySet};
use talentdesk_core::audit::{AuditCategory, AuditOutcome, AuditSink};
use talentdesk_core::domain::join_request::{JoinRequest, JoinRequestId};
use talentdesk_core::domain::membership::{MemberRole, Membership, UserId};
use talentdesk_core::domain::record::RecordId;
use talentdesk_core::errors::{ApplicationError, DomainError};
use talentdesk_core::hierarchy::{HierarchyLimits, MembershipSnapshot};
use talentdesk_core::requests::{BulkRecordRequest, DEFAULT_MAX_BULK_RECORDS};
use talentdesk_core::team::{JoinApproval, TeamRoster};

use super::audit_event;
use crate::repositories::{JoinRequestRepository, MembershipRepository};
use crate::snapshot::load_snapshot;

/// Read-only view of a user's place in the hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamOverview {
    pub user_id: UserId,
    pub visibility: VisibilitySet,
    pub direct_reports: BTreeSet<UserId>,
    pub depth: u32,
}

/// Membership lifecycle: join requests, deactivation, re-parenting, roles.
pub struct TeamWorkflow {
    memberships: Arc<dyn MembershipRepository>,
    join_requests: Arc<dyn JoinRequestRepository>,
    limits: HierarchyLimits,
    audit: Arc<dyn AuditSink>,
    max_bulk_records: usize,
}

impl TeamWorkflow {
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        join_requests: Arc<dyn JoinRequestRepository>,
        limits: HierarchyLimits,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            memberships,
            join_requests,
            limits,
            audit,
            max_bulk_records: DEFAULT_MAX_BULK_RECORDS,
        }
    }

    pub fn with_bulk_limit(mut self, max_bulk_records: usize) -> Self {
        self.max_bulk_records = max_bulk_records;
        self
    }

    pub async fn overview(&self, user_id: &UserId) -> Result<TeamOverview, ApplicationError> {
        let snapshot = load_snapshot(self.memberships.as_ref()).await?;
        let authority = AccessAuthority::new(&snapshot, self.limits);
        let resolver = authority.resolver();

        Ok(TeamOverview {
            user_id: user_id.clone(),
            visibility: authority.visible_owner_ids(user_id),
            direct_reports: resolver.resolve_direct_reports(user_id),
            depth: resolver.hierarchy_depth(user_id),
        })
    }

    /// Record ids a bulk mutation may touch, or the reason the whole batch
    /// is refused.
    pub async fn authorize_bulk<F>(
        &self,
        caller: &UserId,
        request: &BulkRecordRequest,
        owner_of: F,
        correlation_id: &str,
    ) -> Result<Vec<RecordId>, ApplicationError>
    where
        F: Fn(&RecordId) -> Option<UserId>,
    {
        let snapshot = load_snapshot(self.memberships.as_ref()).await?;
        let authority = AccessAuthority::new(&snapshot, self.limits)
            .with_audit_sink(self.audit.clone())
            .with_correlation_id(correlation_id)
            .with_bulk_limit(self.max_bulk_records);

        Ok(authority.authorize_bulk(request, caller, owner_of)?)
    }

    pub async fn request_to_join(
        &self,
        user_id: &UserId,
        role: MemberRole,
        correlation_id: &str,
    ) -> Result<JoinRequest, ApplicationError> {
        if user_id.as_str().trim().is_empty() {
            return Err(DomainError::InvalidRequest("user id must not be blank".to_owned()).into());
        }

        let already_member = self
            .memberships
            .find_by_user(user_id)
            .await?
            .is_some_and(|membership| membership.is_active);
        if already_member {
            return Err(DomainError::InvariantViolation(format!(
                "user `{user_id}` already has an active membership"
            ))
            .into());
        }

        let already_pending = self
            .join_requests
            .list_pending()
            .await?
            .iter()
            .any(|request| request.user_id == *user_id);
        if already_pending {
            return Err(DomainError::InvariantViolation(format!(
                "user `{user_id}` already has a pending join request"
            ))
            .into());
        }

        let request = JoinRequest::new(user_id.clone(), role);
        self.join_requests.save(request.clone()).await?;
        tracing::info!(
            event_name = "team.join_request.created",
            correlation_id,
            request_id = %request.id.0,
            user_id = %user_id,
            role = role.as_str(),
            "join request created"
        );
        Ok(request)
    }

    pub async fn approve_join_request(
        &self,
        approver: &UserId,
        request_id: &JoinRequestId,
        correlation_id: &str,
    ) -> Result<JoinApproval, ApplicationError> {
        let request = self.find_request(request_id).await?;
        let snapshot = load_snapshot(self.memberships.as_ref()).await?;

        let approval = self.roster(&snapshot, correlation_id).approve_join_request(
            approver,
            &request,
            Utc::now(),
        )?;
        self.join_requests
            .apply_approval(
                approval.request.clone(),
                approval.membership.clone(),
                approval.notification.clone(),
            )
            .await?;

        self.audit.emit(
            audit_event(
                correlation_id,
                "team.join_request.approved",
                AuditCategory::Membership,
                approver,
                AuditOutcome::Success,
                request.id.0.clone(),
            )
            .with_metadata("user_id", approval.membership.user_id.to_string())
            .with_metadata("reactivated", approval.reactivated.to_string()),
        );
        Ok(approval)
    }

    pub async fn reject_join_request(
        &self,
        approver: &UserId,
        request_id: &JoinRequestId,
        correlation_id: &str,
    ) -> Result<JoinRequest, ApplicationError> {
        let request = self.find_request(request_id).await?;
        let snapshot = load_snapshot(self.memberships.as_ref()).await?;

        let decided = self.roster(&snapshot, correlation_id).reject_join_request(
            approver,
            &request,
            Utc::now(),
        )?;
        self.join_requests.save(decided.clone()).await?;

        self.audit.emit(audit_event(
            correlation_id,
            "team.join_request.rejected",
            AuditCategory::Membership,
            approver,
            AuditOutcome::Success,
            decided.id.0.clone(),
        ));
        Ok(decided)
    }

    pub async fn pending_join_requests(&self) -> Result<Vec<JoinRequest>, ApplicationError> {
        Ok(self.join_requests.list_pending().await?)
    }

    pub async fn deactivate(
        &self,
        actor: &UserId,
        target: &UserId,
        correlation_id: &str,
    ) -> Result<Membership, ApplicationError> {
        let snapshot = load_snapshot(self.memberships.as_ref()).await?;
        let updated = self.roster(&snapshot, correlation_id).deactivate(actor, target, Utc::now())?;
        self.persist(actor, updated, "team.membership.deactivated", correlation_id).await
    }

    pub async fn reassign_manager(
        &self,
        actor: &UserId,
        target: &UserId,
        new_manager: &UserId,
        correlation_id: &str,
    ) -> Result<Membership, ApplicationError> {
        let snapshot = load_snapshot(self.memberships.as_ref()).await?;
        let updated = self.roster(&snapshot, correlation_id).reassign_manager(
            actor,
            target,
            new_manager,
            Utc::now(),
        )?;
        self.persist(actor, updated, "team.membership.reassigned", correlation_id).await
    }

    pub async fn change_role(
        &self,
        actor: &UserId,
        target: &UserId,
        role: MemberRole,
        correlation_id: &str,
    ) -> Result<Membership, ApplicationError> {
        let snapshot = load_snapshot(self.memberships.as_ref()).await?;
        let updated =
            self.roster(&snapshot, correlation_id).change_role(actor, target, role, Utc::now())?;
        self.persist(actor, updated, "team.membership.role_changed", correlation_id).await
    }

    fn roster<'a>(
        &self,
        snapshot: &'a MembershipSnapshot,
        correlation_id: &str,
    ) -> TeamRoster<&'a MembershipSnapshot> {
        TeamRoster::new(
            AccessAuthority::new(snapshot, self.limits)
                .with_audit_sink(self.audit.clone())
                .with_correlation_id(correlation_id),
        )
    }

    async fn find_request(
        &self,
        request_id: &JoinRequestId,
    ) -> Result<JoinRequest, ApplicationError> {
        self.join_requests
            .find_by_id(request_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("join request {}", request_id.0)))
    }

    async fn persist(
        &self,
        actor: &UserId,
        membership: Membership,
        event_type: &str,
        correlation_id: &str,
    ) -> Result<Membership, ApplicationError> {
        self.memberships.save(membership.clone()).await?;
        self.audit.emit(
            audit_event(
                correlation_id,
                event_type,
                AuditCategory::Membership,
                actor,
                AuditOutcome::Success,
                membership.user_id.to_string(),
            )
            .with_metadata("role", membership.role.as_str())
            .with_metadata("is_active", membership.is_active.to_string()),
        );
        Ok(membership)
    }
}
