pub mod store;

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::membership::UserId;

pub use store::{MembershipSnapshot, MembershipStore};

pub const DEFAULT_MAX_DEPTH: u32 = 10;
pub const DEFAULT_MAX_ESCALATION_HOPS: u32 = 5;

/// Hop caps that keep upward walks finite on malformed manager chains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyLimits {
    pub max_depth: u32,
    pub max_escalation_hops: u32,
}

impl Default for HierarchyLimits {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH, max_escalation_hops: DEFAULT_MAX_ESCALATION_HOPS }
    }
}

/// Computes team membership from the "managed by" relation.
///
/// Every walk carries a visited set or a hop cap, so cycles and dangling
/// `manager_id` references degrade to a finite answer instead of an error.
#[derive(Clone, Debug)]
pub struct HierarchyResolver<S> {
    store: S,
    limits: HierarchyLimits,
}

impl<S> HierarchyResolver<S>
where
    S: MembershipStore,
{
    pub fn new(store: S, limits: HierarchyLimits) -> Self {
        Self { store, limits }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn limits(&self) -> HierarchyLimits {
        self.limits
    }

    /// Everyone whose active manager chain leads back to `root`, plus `root`.
    /// A `root` without an active membership is never expanded.
    pub fn resolve_team(&self, root: &UserId) -> BTreeSet<UserId> {
        if !self.is_active(root) {
            return BTreeSet::from([root.clone()]);
        }

        let mut visited = BTreeSet::new();
        let mut pending = vec![root.clone()];

        while let Some(candidate) = pending.pop() {
            if !visited.insert(candidate.clone()) {
                continue;
            }

            pending.extend(
                self.store
                    .find_active_reports_of(&candidate)
                    .into_iter()
                    .map(|report| report.user_id)
                    .filter(|user_id| !visited.contains(user_id)),
            );
        }

        visited
    }

    /// Immediate active reports of `root`, plus `root` when it is an active admin.
    /// Empty when `root` itself is not active.
    pub fn resolve_direct_reports(&self, root: &UserId) -> BTreeSet<UserId> {
        if !self.is_active(root) {
            return BTreeSet::new();
        }

        let mut reports: BTreeSet<UserId> = self
            .store
            .find_active_reports_of(root)
            .into_iter()
            .map(|report| report.user_id)
            .collect();

        let root_is_admin =
            self.store.find_membership(root).is_some_and(|membership| membership.is_active_admin());
        if root_is_admin {
            reports.insert(root.clone());
        }

        reports
    }

    pub fn is_root_admin(&self, user_id: &UserId) -> bool {
        self.store.find_membership(user_id).is_some_and(|membership| membership.is_root_admin())
    }

    /// Upward hop count to the top of the chain, capped at `max_depth`.
    pub fn hierarchy_depth(&self, user_id: &UserId) -> u32 {
        let Some(mut current) = self.store.find_membership(user_id) else {
            return 0;
        };

        let mut depth = 0;
        while let Some(manager_id) = current.manager_id.take() {
            if depth >= self.limits.max_depth {
                break;
            }
            depth += 1;

            match self.store.find_membership(&manager_id) {
                Some(manager) => current = manager,
                None => break,
            }
        }

        depth
    }

    /// Manager chain above `user_id`, nearest first, regardless of activity.
    /// Stops on the first repeated node.
    pub fn ancestors(&self, user_id: &UserId) -> Vec<UserId> {
        let mut chain = Vec::new();
        let mut visited = HashSet::from([user_id.clone()]);
        let mut next = self.store.find_membership(user_id).and_then(|member| member.manager_id);

        while let Some(manager_id) = next {
            if !visited.insert(manager_id.clone()) {
                break;
            }
            next = self.store.find_membership(&manager_id).and_then(|member| member.manager_id);
            chain.push(manager_id);
        }

        chain
    }

    fn is_active(&self, user_id: &UserId) -> bool {
        self.store.find_membership(user_id).is_some_and(|membership| membership.is_active)
    }
}
