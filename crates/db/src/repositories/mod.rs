use async_trait::async_trait;
use thiserror::Error;

use talentdesk_core::domain::join_request::{JoinRequest, JoinRequestId};
use talentdesk_core::domain::membership::{Membership, UserId};
use talentdesk_core::domain::notification::{Notification, NotificationId};
use talentdesk_core::domain::time_entry::{TimeEntry, TimeEntryId, TimeEntryStatus};
use talentdesk_core::errors::ApplicationError;

pub mod join_request;
pub mod membership;
pub mod memory;
pub mod notification;
pub mod time_entry;

pub use join_request::SqlJoinRequestRepository;
pub use membership::SqlMembershipRepository;
pub use memory::{InMemoryTeamRepository, InMemoryTimeEntryRepository};
pub use notification::SqlNotificationRepository;
pub use time_entry::SqlTimeEntryRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(what) => Self::NotFound(what),
            other => Self::Persistence(other.to_string()),
        }
    }
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<Membership>, RepositoryError>;

    /// Every membership row, active or not, ordered by `user_id`.
    async fn list_all(&self) -> Result<Vec<Membership>, RepositoryError>;

    async fn save(&self, membership: Membership) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait JoinRequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &JoinRequestId)
        -> Result<Option<JoinRequest>, RepositoryError>;

    async fn list_pending(&self) -> Result<Vec<JoinRequest>, RepositoryError>;

    async fn save(&self, request: JoinRequest) -> Result<(), RepositoryError>;

    /// Stores the decided request, the resulting membership and the new
    /// member's notification together.
    async fn apply_approval(
        &self,
        request: JoinRequest,
        membership: Membership,
        notification: Notification,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait TimeEntryRepository: Send + Sync {
    async fn find_by_id(&self, id: &TimeEntryId) -> Result<Option<TimeEntry>, RepositoryError>;

    async fn list_for_owners(
        &self,
        owners: &[UserId],
        status: Option<TimeEntryStatus>,
    ) -> Result<Vec<TimeEntry>, RepositoryError>;

    /// Inserts a new entry and, when present, the approver notification.
    async fn submit(
        &self,
        entry: TimeEntry,
        notification: Option<Notification>,
    ) -> Result<(), RepositoryError>;

    /// Writes a decided entry and its submitter notification as one unit.
    /// Fails with `NotFound` when the stored entry is no longer pending.
    async fn apply_decision(
        &self,
        entry: TimeEntry,
        notification: Option<Notification>,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn list_for_recipient(
        &self,
        recipient_id: &UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, RepositoryError>;

    async fn save(&self, notification: Notification) -> Result<(), RepositoryError>;

    async fn mark_read(&self, id: &NotificationId) -> Result<bool, RepositoryError>;
}

pub(crate) fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_timestamp(
    column: &str,
    raw: &str,
) -> Result<chrono::DateTime<chrono::Utc>, RepositoryError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&chrono::Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}
