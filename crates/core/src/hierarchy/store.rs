use std::collections::HashMap;

use crate::domain::membership::{Membership, UserId};

/// Read-only view of team memberships consulted by the hierarchy engines.
///
/// Reads are expected to be strongly consistent for the lifetime of one
/// request. Implementations must not hand out inactive rows from
/// `find_active_reports_of` or `list_active`.
pub trait MembershipStore {
    fn find_membership(&self, user_id: &UserId) -> Option<Membership>;
    fn find_active_reports_of(&self, manager_id: &UserId) -> Vec<Membership>;
    fn list_active(&self) -> Vec<Membership>;
}

impl<T> MembershipStore for &T
where
    T: MembershipStore + ?Sized,
{
    fn find_membership(&self, user_id: &UserId) -> Option<Membership> {
        (**self).find_membership(user_id)
    }

    fn find_active_reports_of(&self, manager_id: &UserId) -> Vec<Membership> {
        (**self).find_active_reports_of(manager_id)
    }

    fn list_active(&self) -> Vec<Membership> {
        (**self).list_active()
    }
}

/// Point-in-time copy of the membership table with a reverse manager index.
///
/// Loaded once per request; never shared across requests.
#[derive(Clone, Debug, Default)]
pub struct MembershipSnapshot {
    by_user: HashMap<UserId, Membership>,
    active_reports: HashMap<UserId, Vec<UserId>>,
}

impl MembershipSnapshot {
    pub fn new(memberships: Vec<Membership>) -> Self {
        let by_user: HashMap<UserId, Membership> = memberships
            .into_iter()
            .map(|membership| (membership.user_id.clone(), membership))
            .collect();

        let mut active_reports: HashMap<UserId, Vec<UserId>> = HashMap::new();
        for membership in by_user.values().filter(|membership| membership.is_active) {
            if let Some(manager_id) = &membership.manager_id {
                active_reports
                    .entry(manager_id.clone())
                    .or_default()
                    .push(membership.user_id.clone());
            }
        }
        for reports in active_reports.values_mut() {
            reports.sort();
        }

        Self { by_user, active_reports }
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}

impl MembershipStore for MembershipSnapshot {
    fn find_membership(&self, user_id: &UserId) -> Option<Membership> {
        self.by_user.get(user_id).cloned()
    }

    fn find_active_reports_of(&self, manager_id: &UserId) -> Vec<Membership> {
        self.active_reports
            .get(manager_id)
            .map(|reports| {
                reports.iter().filter_map(|user_id| self.by_user.get(user_id)).cloned().collect()
            })
            .unwrap_or_default()
    }

    fn list_active(&self) -> Vec<Membership> {
        let mut active: Vec<Membership> =
            self.by_user.values().filter(|membership| membership.is_active).cloned().collect();
        active.sort_by(|left, right| left.user_id.cmp(&right.user_id));
        active
    }
}
