use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::access::{AccessAuthority, AccessError};
use crate::domain::join_request::{JoinRequest, JoinRequestStatus};
use crate::domain::membership::{MemberRole, Membership, UserId};
use crate::domain::notification::Notification;
use crate::errors::DomainError;
use crate::hierarchy::MembershipStore;

/// Result of approving a join request: the decided request, the membership
/// row and the new member's notice, written together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinApproval {
    pub request: JoinRequest,
    pub membership: Membership,
    pub notification: Notification,
    pub reactivated: bool,
}

/// Membership lifecycle rules checked against the current hierarchy.
///
/// Every method returns the rows to persist and leaves the store untouched.
#[derive(Clone)]
pub struct TeamRoster<S> {
    authority: AccessAuthority<S>,
}

impl<S> TeamRoster<S>
where
    S: MembershipStore,
{
    pub fn new(authority: AccessAuthority<S>) -> Self {
        Self { authority }
    }

    pub fn authority(&self) -> &AccessAuthority<S> {
        &self.authority
    }

    pub fn approve_join_request(
        &self,
        approver: &UserId,
        request: &JoinRequest,
        now: DateTime<Utc>,
    ) -> Result<JoinApproval, DomainError> {
        self.authority.require_admin(approver)?;
        ensure_pending(request, JoinRequestStatus::Approved)?;

        let store = self.authority.resolver().store();
        let (membership, reactivated) = match store.find_membership(&request.user_id) {
            Some(existing) if existing.is_active => {
                return Err(DomainError::InvariantViolation(format!(
                    "user `{}` already has an active membership",
                    request.user_id
                )));
            }
            Some(mut existing) => {
                existing.is_active = true;
                existing.role = request.requested_role;
                existing.manager_id = Some(approver.clone());
                existing.updated_at = now;
                (existing, true)
            }
            None => {
                let mut created = Membership::new(
                    request.user_id.clone(),
                    request.requested_role,
                    Some(approver.clone()),
                );
                created.created_at = now;
                created.updated_at = now;
                (created, false)
            }
        };

        let mut decided = request.clone();
        decided.status = JoinRequestStatus::Approved;
        decided.decided_by = Some(approver.clone());
        decided.updated_at = now;

        info!(
            event_name = "team.join_request.approved",
            request_id = %decided.id.0,
            user_id = %decided.user_id,
            approver = %approver,
            role = membership.role.as_str(),
            reactivated,
            "join request approved"
        );
        let notification = Notification::join_request_approved(&decided, &membership, now);
        Ok(JoinApproval { request: decided, membership, notification, reactivated })
    }

    pub fn reject_join_request(
        &self,
        approver: &UserId,
        request: &JoinRequest,
        now: DateTime<Utc>,
    ) -> Result<JoinRequest, DomainError> {
        self.authority.require_admin(approver)?;
        ensure_pending(request, JoinRequestStatus::Rejected)?;

        let mut decided = request.clone();
        decided.status = JoinRequestStatus::Rejected;
        decided.decided_by = Some(approver.clone());
        decided.updated_at = now;
        Ok(decided)
    }

    pub fn deactivate(
        &self,
        actor: &UserId,
        target: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Membership, DomainError> {
        if actor == target {
            return Err(DomainError::InvalidRequest(
                "members cannot deactivate their own membership".to_owned(),
            ));
        }
        self.authority.require_admin(actor)?;
        let membership = self.active_target(target)?;
        self.authority.check_access(actor, target)?;

        let mut updated = membership.deactivated();
        updated.updated_at = now;
        info!(
            event_name = "team.membership.deactivated",
            actor = %actor,
            user_id = %target,
            "membership deactivated"
        );
        Ok(updated)
    }

    /// Moves `target` under `new_manager`. Rejected when `new_manager` sits
    /// anywhere below `target`, inactive links included.
    pub fn reassign_manager(
        &self,
        actor: &UserId,
        target: &UserId,
        new_manager: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Membership, DomainError> {
        self.authority.require_admin(actor)?;
        let mut membership = self.active_target(target)?;
        self.authority.check_access(actor, target)?;
        self.authority.check_access(actor, new_manager)?;

        let manager_is_admin = self
            .authority
            .resolver()
            .store()
            .find_membership(new_manager)
            .is_some_and(|manager| manager.is_active_admin());
        if !manager_is_admin {
            return Err(AccessError::AdminRequired { user_id: new_manager.clone() }.into());
        }

        let creates_cycle = new_manager == target
            || self.authority.resolver().ancestors(new_manager).contains(target);
        if creates_cycle {
            return Err(DomainError::HierarchyCycle {
                user_id: target.clone(),
                manager_id: new_manager.clone(),
            });
        }

        let previous = membership.manager_id.replace(new_manager.clone());
        membership.updated_at = now;
        info!(
            event_name = "team.membership.reassigned",
            actor = %actor,
            user_id = %target,
            previous_manager = previous.as_ref().map(UserId::as_str).unwrap_or("none"),
            new_manager = %new_manager,
            "manager reassigned"
        );
        Ok(membership)
    }

    pub fn change_role(
        &self,
        actor: &UserId,
        target: &UserId,
        role: MemberRole,
        now: DateTime<Utc>,
    ) -> Result<Membership, DomainError> {
        if actor == target {
            return Err(DomainError::InvalidRequest(
                "members cannot change their own role".to_owned(),
            ));
        }
        self.authority.require_admin(actor)?;
        let mut membership = self.active_target(target)?;
        self.authority.check_access(actor, target)?;

        membership.role = role;
        membership.updated_at = now;
        Ok(membership)
    }

    fn active_target(&self, target: &UserId) -> Result<Membership, DomainError> {
        self.authority
            .resolver()
            .store()
            .find_membership(target)
            .filter(|membership| membership.is_active)
            .ok_or_else(|| AccessError::NoActiveMembership { user_id: target.clone() }.into())
    }
}

fn ensure_pending(request: &JoinRequest, next: JoinRequestStatus) -> Result<(), DomainError> {
    if request.status == JoinRequestStatus::Pending {
        Ok(())
    } else {
        Err(DomainError::InvalidTransition { from: request.status.as_str(), to: next.as_str() })
    }
}
