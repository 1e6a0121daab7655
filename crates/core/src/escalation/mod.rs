use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::membership::UserId;
use crate::hierarchy::{HierarchyLimits, MembershipStore};

/// Who should receive an approval request for a submitter, and how far up
/// the chain the walk had to go to find them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationTarget {
    pub manager_id: UserId,
    pub level: u32,
    pub escalated: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalAuthority {
    pub can_approve: bool,
    pub is_escalated: bool,
    pub level: u32,
}

impl ApprovalAuthority {
    pub fn denied() -> Self {
        Self { can_approve: false, is_escalated: false, level: 0 }
    }

    fn direct() -> Self {
        Self { can_approve: true, is_escalated: false, level: 1 }
    }
}

/// Submitters whose pending entries a manager should see in their queue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerQueue {
    pub direct_reports: BTreeSet<UserId>,
    pub escalated_users: BTreeSet<UserId>,
}

/// Walks the manager chain upward to find the nearest approver who can act.
///
/// Independent of the downward resolver: an inactive or contributor manager
/// is skipped rather than cutting the walk short.
#[derive(Clone, Debug)]
pub struct EscalationRouter<S> {
    store: S,
    max_hops: u32,
}

impl<S> EscalationRouter<S>
where
    S: MembershipStore,
{
    pub fn new(store: S, limits: HierarchyLimits) -> Self {
        Self { store, max_hops: limits.max_escalation_hops }
    }

    pub fn find_available_manager(&self, submitter: &UserId) -> Option<EscalationTarget> {
        let mut next = self.store.find_membership(submitter)?.manager_id;
        let mut visited = HashSet::from([submitter.clone()]);
        let mut steps = 0;

        while let Some(candidate_id) = next {
            if steps >= self.max_hops {
                debug!(
                    event_name = "escalation.hop_cap_reached",
                    submitter = %submitter,
                    max_hops = self.max_hops,
                    "no approver within hop cap"
                );
                return None;
            }
            steps += 1;

            if !visited.insert(candidate_id.clone()) {
                debug!(
                    event_name = "escalation.cycle_detected",
                    submitter = %submitter,
                    revisited = %candidate_id,
                    "manager chain loops back on itself"
                );
                return None;
            }

            let candidate = self.store.find_membership(&candidate_id)?;
            if candidate.is_active_admin() {
                return Some(EscalationTarget {
                    manager_id: candidate.user_id,
                    level: steps,
                    escalated: steps > 1,
                });
            }
            next = candidate.manager_id;
        }

        None
    }

    pub fn can_approve(&self, approver: &UserId, submitter: &UserId) -> ApprovalAuthority {
        if approver == submitter {
            return ApprovalAuthority::denied();
        }
        let Some(submitter_membership) = self.store.find_membership(submitter) else {
            return ApprovalAuthority::denied();
        };

        if submitter_membership.reports_to(approver) {
            let direct_manager_available = self
                .store
                .find_membership(approver)
                .is_some_and(|membership| membership.is_active_admin());
            if direct_manager_available {
                return ApprovalAuthority::direct();
            }
        }

        match self.find_available_manager(submitter) {
            Some(target) if target.escalated && target.manager_id == *approver => {
                ApprovalAuthority { can_approve: true, is_escalated: true, level: target.level }
            }
            _ => ApprovalAuthority::denied(),
        }
    }

    /// Full scan over active members; cost grows with the whole agency, not
    /// with the manager's team.
    pub fn manager_visible_submitters(&self, manager: &UserId) -> ManagerQueue {
        let direct_reports: BTreeSet<UserId> = self
            .store
            .find_active_reports_of(manager)
            .into_iter()
            .map(|report| report.user_id)
            .collect();

        let escalated_users = self
            .store
            .list_active()
            .into_iter()
            .map(|membership| membership.user_id)
            .filter(|user_id| user_id != manager && !direct_reports.contains(user_id))
            .filter(|user_id| {
                self.find_available_manager(user_id)
                    .is_some_and(|target| target.escalated && target.manager_id == *manager)
            })
            .collect();

        ManagerQueue { direct_reports, escalated_users }
    }
}
