use std::collections::{BTreeMap, HashMap};

use tokio::sync::RwLock;

use talentdesk_core::domain::join_request::{JoinRequest, JoinRequestId, JoinRequestStatus};
use talentdesk_core::domain::membership::{Membership, UserId};
use talentdesk_core::domain::notification::{Notification, NotificationId};
use talentdesk_core::domain::time_entry::{TimeEntry, TimeEntryId, TimeEntryStatus};

use super::{
    JoinRequestRepository, MembershipRepository, NotificationRepository, RepositoryError,
    TimeEntryRepository,
};

#[derive(Default)]
struct TeamState {
    memberships: BTreeMap<UserId, Membership>,
    join_requests: HashMap<String, JoinRequest>,
    notifications: Vec<Notification>,
}

/// Memberships, join requests and membership notices behind one lock, so an
/// approval updates all three under the same write guard.
#[derive(Default)]
pub struct InMemoryTeamRepository {
    state: RwLock<TeamState>,
}

#[async_trait::async_trait]
impl MembershipRepository for InMemoryTeamRepository {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Membership>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.memberships.get(user_id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Membership>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.memberships.values().cloned().collect())
    }

    async fn save(&self, membership: Membership) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.memberships.insert(membership.user_id.clone(), membership);
        Ok(())
    }
}

#[async_trait::async_trait]
impl JoinRequestRepository for InMemoryTeamRepository {
    async fn find_by_id(
        &self,
        id: &JoinRequestId,
    ) -> Result<Option<JoinRequest>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.join_requests.get(&id.0).cloned())
    }

    async fn list_pending(&self) -> Result<Vec<JoinRequest>, RepositoryError> {
        let state = self.state.read().await;
        let mut pending: Vec<JoinRequest> = state
            .join_requests
            .values()
            .filter(|request| request.status == JoinRequestStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(pending)
    }

    async fn save(&self, request: JoinRequest) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.join_requests.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn apply_approval(
        &self,
        request: JoinRequest,
        membership: Membership,
        notification: Notification,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let still_pending = state
            .join_requests
            .get(&request.id.0)
            .is_some_and(|stored| stored.status == JoinRequestStatus::Pending);
        if !still_pending {
            return Err(RepositoryError::NotFound(format!(
                "pending join request {}",
                request.id.0
            )));
        }

        state.join_requests.insert(request.id.0.clone(), request);
        state.memberships.insert(membership.user_id.clone(), membership);
        state.notifications.push(notification);
        Ok(())
    }
}

#[async_trait::async_trait]
impl NotificationRepository for InMemoryTeamRepository {
    async fn list_for_recipient(
        &self,
        recipient_id: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let state = self.state.read().await;
        Ok(inbox(&state.notifications, recipient_id, unread_only))
    }

    async fn save(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.notifications.push(notification);
        Ok(())
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(mark_notification_read(&mut state.notifications, id))
    }
}

#[derive(Default)]
struct TimeEntryState {
    entries: HashMap<String, TimeEntry>,
    notifications: Vec<Notification>,
}

/// Time entries and notifications behind one lock, mirroring the SQL
/// repository's single transaction per decision.
#[derive(Default)]
pub struct InMemoryTimeEntryRepository {
    state: RwLock<TimeEntryState>,
}

#[async_trait::async_trait]
impl TimeEntryRepository for InMemoryTimeEntryRepository {
    async fn find_by_id(&self, id: &TimeEntryId) -> Result<Option<TimeEntry>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.entries.get(&id.0).cloned())
    }

    async fn list_for_owners(
        &self,
        owners: &[UserId],
        status: Option<TimeEntryStatus>,
    ) -> Result<Vec<TimeEntry>, RepositoryError> {
        let state = self.state.read().await;
        let mut entries: Vec<TimeEntry> = state
            .entries
            .values()
            .filter(|entry| owners.contains(&entry.owner_id))
            .filter(|entry| status.map_or(true, |wanted| entry.status == wanted))
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            b.work_date
                .cmp(&a.work_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(entries)
    }

    async fn submit(
        &self,
        entry: TimeEntry,
        notification: Option<Notification>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.entries.insert(entry.id.0.clone(), entry);
        state.notifications.extend(notification);
        Ok(())
    }

    async fn apply_decision(
        &self,
        entry: TimeEntry,
        notification: Option<Notification>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let still_pending = state
            .entries
            .get(&entry.id.0)
            .is_some_and(|stored| stored.status == TimeEntryStatus::Pending);
        if !still_pending {
            return Err(RepositoryError::NotFound(format!("pending time entry {}", entry.id.0)));
        }

        state.entries.insert(entry.id.0.clone(), entry);
        state.notifications.extend(notification);
        Ok(())
    }
}

#[async_trait::async_trait]
impl NotificationRepository for InMemoryTimeEntryRepository {
    async fn list_for_recipient(
        &self,
        recipient_id: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let state = self.state.read().await;
        Ok(inbox(&state.notifications, recipient_id, unread_only))
    }

    async fn save(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.notifications.push(notification);
        Ok(())
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(mark_notification_read(&mut state.notifications, id))
    }
}

/// Newest first.
fn inbox(
    notifications: &[Notification],
    recipient_id: &UserId,
    unread_only: bool,
) -> Vec<Notification> {
    let mut matching: Vec<Notification> = notifications
        .iter()
        .filter(|notification| notification.recipient_id == *recipient_id)
        .filter(|notification| !unread_only || !notification.read)
        .cloned()
        .collect();
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    matching
}

fn mark_notification_read(notifications: &mut [Notification], id: &NotificationId) -> bool {
    match notifications.iter_mut().find(|notification| notification.id == *id) {
        Some(notification) if !notification.read => {
            notification.read = true;
            true
        }
        _ => false,
    }
}
