use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use talentdesk_core::access::AccessError;
use talentdesk_core::audit::{AuditCategory, AuditOutcome, AuditSink};
use talentdesk_core::domain::membership::UserId;
use talentdesk_core::domain::notification::Notification;
use talentdesk_core::domain::time_entry::{TimeEntry, TimeEntryId, TimeEntryStatus};
use talentdesk_core::errors::{ApplicationError, DomainError};
use talentdesk_core::escalation::{EscalationRouter, EscalationTarget, ManagerQueue};
use talentdesk_core::hierarchy::{HierarchyLimits, MembershipStore};
use talentdesk_core::rate_limit::{RateDecision, RateLimiter};
use talentdesk_core::requests::TimeEntryDecision;

use super::audit_event;
use crate::repositories::{MembershipRepository, TimeEntryRepository};
use crate::snapshot::load_snapshot;

const MAX_MINUTES_PER_ENTRY: u32 = 24 * 60;

/// What happened to a submitted entry: stored, and who (if anyone) was asked
/// to approve it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub entry: TimeEntry,
    pub routed_to: Option<EscalationTarget>,
}

/// Time entry submission and approval, routed through the escalation walk.
pub struct ApprovalWorkflow {
    memberships: Arc<dyn MembershipRepository>,
    entries: Arc<dyn TimeEntryRepository>,
    limits: HierarchyLimits,
    audit: Arc<dyn AuditSink>,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl ApprovalWorkflow {
    pub fn new(
        memberships: Arc<dyn MembershipRepository>,
        entries: Arc<dyn TimeEntryRepository>,
        limits: HierarchyLimits,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { memberships, entries, limits, audit, rate_limiter: None }
    }

    /// Caps submissions per submitter.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Nearest active admin above `submitter`, or `None` when the chain has
    /// no one who can approve.
    pub async fn route(
        &self,
        submitter: &UserId,
    ) -> Result<Option<EscalationTarget>, ApplicationError> {
        let snapshot = load_snapshot(self.memberships.as_ref()).await?;
        Ok(EscalationRouter::new(&snapshot, self.limits).find_available_manager(submitter))
    }

    /// Stores a pending entry and notifies the routed approver in the same
    /// write. An entry with no available approver is still stored; it waits
    /// until the hierarchy is repaired.
    pub async fn submit(
        &self,
        entry: TimeEntry,
        correlation_id: &str,
    ) -> Result<SubmissionReceipt, ApplicationError> {
        validate_submission(&entry)?;

        let snapshot = load_snapshot(self.memberships.as_ref()).await?;
        let submitter_active = snapshot
            .find_membership(&entry.owner_id)
            .is_some_and(|membership| membership.is_active);
        if !submitter_active {
            return Err(AccessError::NoActiveMembership { user_id: entry.owner_id.clone() }.into());
        }

        // Only active members spend quota.
        if let Some(limiter) = &self.rate_limiter {
            if let RateDecision::Limited { retry_after_secs } =
                limiter.check(entry.owner_id.as_str(), Utc::now())
            {
                return Err(ApplicationError::RateLimited {
                    key: entry.owner_id.to_string(),
                    retry_after_secs,
                });
            }
        }

        let routed_to =
            EscalationRouter::new(&snapshot, self.limits).find_available_manager(&entry.owner_id);
        let notification = routed_to
            .as_ref()
            .map(|target| Notification::approval_requested(&entry, target, Utc::now()));

        self.entries.submit(entry.clone(), notification).await?;

        match &routed_to {
            Some(target) => info!(
                event_name = "approval.time_entry.submitted",
                correlation_id,
                entry_id = %entry.id.0,
                submitter = %entry.owner_id,
                approver = %target.manager_id,
                level = target.level,
                escalated = target.escalated,
                "time entry routed for approval"
            ),
            None => warn!(
                event_name = "approval.time_entry.no_approver",
                correlation_id,
                entry_id = %entry.id.0,
                submitter = %entry.owner_id,
                "no active admin above submitter; entry left unrouted"
            ),
        }

        Ok(SubmissionReceipt { entry, routed_to })
    }

    /// Approves or rejects a pending entry. The decided entry and the owner's
    /// notification are persisted together or not at all.
    pub async fn decide(
        &self,
        approver: &UserId,
        entry_id: &TimeEntryId,
        decision: &TimeEntryDecision,
        correlation_id: &str,
    ) -> Result<TimeEntry, ApplicationError> {
        decision.validate()?;

        let mut entry = self
            .entries
            .find_by_id(entry_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("time entry {}", entry_id.0)))?;

        let snapshot = load_snapshot(self.memberships.as_ref()).await?;
        let authority =
            EscalationRouter::new(&snapshot, self.limits).can_approve(approver, &entry.owner_id);

        if !authority.can_approve {
            warn!(
                event_name = "approval.time_entry.denied",
                correlation_id,
                entry_id = %entry.id.0,
                approver = %approver,
                submitter = %entry.owner_id,
                "approver has no authority over submitter"
            );
            self.audit.emit(
                audit_event(
                    correlation_id,
                    "approval.time_entry.denied",
                    AuditCategory::Approval,
                    approver,
                    AuditOutcome::Rejected,
                    entry.id.0.clone(),
                )
                .with_metadata("submitter", entry.owner_id.to_string())
                .with_metadata("decision", decision.name()),
            );
        }

        let now = Utc::now();
        entry.record_decision(approver, decision, &authority, now)?;
        let notification = Notification::decision_recorded(&entry, now);
        self.entries.apply_decision(entry.clone(), notification).await?;

        let event_type = match entry.status {
            TimeEntryStatus::Rejected => "approval.time_entry.rejected",
            _ => "approval.time_entry.approved",
        };
        info!(
            event_name = event_type,
            correlation_id,
            entry_id = %entry.id.0,
            approver = %approver,
            level = authority.level,
            escalated = authority.is_escalated,
            "time entry decided"
        );
        self.audit.emit(
            audit_event(
                correlation_id,
                event_type,
                AuditCategory::Approval,
                approver,
                AuditOutcome::Success,
                entry.id.0.clone(),
            )
            .with_metadata("submitter", entry.owner_id.to_string())
            .with_metadata("level", authority.level.to_string())
            .with_metadata("escalated", authority.is_escalated.to_string()),
        );

        Ok(entry)
    }

    /// Pending entries from the manager's direct reports plus everyone whose
    /// approvals currently escalate to them.
    pub async fn pending_queue(
        &self,
        manager: &UserId,
    ) -> Result<Vec<TimeEntry>, ApplicationError> {
        let snapshot = load_snapshot(self.memberships.as_ref()).await?;
        let ManagerQueue { direct_reports, escalated_users } =
            EscalationRouter::new(&snapshot, self.limits).manager_visible_submitters(manager);

        let owners: Vec<UserId> = direct_reports
            .into_iter()
            .chain(escalated_users)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Ok(self.entries.list_for_owners(&owners, Some(TimeEntryStatus::Pending)).await?)
    }
}

fn validate_submission(entry: &TimeEntry) -> Result<(), DomainError> {
    if entry.status != TimeEntryStatus::Pending {
        return Err(DomainError::InvalidRequest(format!(
            "new time entries must be pending, got `{}`",
            entry.status.as_str()
        )));
    }
    if entry.minutes == 0 || entry.minutes > MAX_MINUTES_PER_ENTRY {
        return Err(DomainError::InvalidRequest(format!(
            "minutes must be between 1 and {MAX_MINUTES_PER_ENTRY}, got {}",
            entry.minutes
        )));
    }
    if entry.description.trim().is_empty() {
        return Err(DomainError::InvalidRequest("description must not be blank".to_owned()));
    }
    Ok(())
}
