use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::join_request::JoinRequest;
use crate::domain::membership::{Membership, UserId};
use crate::domain::time_entry::{TimeEntry, TimeEntryStatus};
use crate::escalation::EscalationTarget;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TimeEntrySubmitted,
    TimeEntryEscalated,
    TimeEntryApproved,
    TimeEntryRejected,
    JoinRequestApproved,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TimeEntrySubmitted => "time_entry_submitted",
            Self::TimeEntryEscalated => "time_entry_escalated",
            Self::TimeEntryApproved => "time_entry_approved",
            Self::TimeEntryRejected => "time_entry_rejected",
            Self::JoinRequestApproved => "join_request_approved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "time_entry_submitted" => Some(Self::TimeEntrySubmitted),
            "time_entry_escalated" => Some(Self::TimeEntryEscalated),
            "time_entry_approved" => Some(Self::TimeEntryApproved),
            "time_entry_rejected" => Some(Self::TimeEntryRejected),
            "join_request_approved" => Some(Self::JoinRequestApproved),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub kind: NotificationKind,
    pub subject_id: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: UserId,
        kind: NotificationKind,
        subject_id: impl Into<String>,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId(format!("NTF-{}", Uuid::new_v4())),
            recipient_id,
            kind,
            subject_id: subject_id.into(),
            message: message.into(),
            read: false,
            created_at,
        }
    }

    /// Approval request sent to whoever the escalation walk selected.
    pub fn approval_requested(
        entry: &TimeEntry,
        target: &EscalationTarget,
        now: DateTime<Utc>,
    ) -> Self {
        let (kind, message) = if target.escalated {
            (
                NotificationKind::TimeEntryEscalated,
                format!(
                    "time entry from {} for {} escalated to you (level {}); their manager is unavailable",
                    entry.owner_id, entry.work_date, target.level
                ),
            )
        } else {
            (
                NotificationKind::TimeEntrySubmitted,
                format!(
                    "time entry from {} for {} awaits your approval",
                    entry.owner_id, entry.work_date
                ),
            )
        };
        Self::new(target.manager_id.clone(), kind, entry.id.0.clone(), message, now)
    }

    /// Outcome notice for the entry owner. Returns `None` while the entry is pending.
    pub fn decision_recorded(entry: &TimeEntry, now: DateTime<Utc>) -> Option<Self> {
        let approver = entry.approved_by.as_ref()?;
        let (kind, message) = match entry.status {
            TimeEntryStatus::Pending => return None,
            TimeEntryStatus::Approved => (
                NotificationKind::TimeEntryApproved,
                format!("your time entry for {} was approved by {approver}", entry.work_date),
            ),
            TimeEntryStatus::Rejected => (
                NotificationKind::TimeEntryRejected,
                format!(
                    "your time entry for {} was rejected by {approver}: {}",
                    entry.work_date,
                    entry.rejection_reason.as_deref().unwrap_or("no reason given")
                ),
            ),
        };
        Some(Self::new(entry.owner_id.clone(), kind, entry.id.0.clone(), message, now))
    }

    /// Welcome notice for the member an approved join request placed in the tree.
    pub fn join_request_approved(
        request: &JoinRequest,
        membership: &Membership,
        now: DateTime<Utc>,
    ) -> Self {
        let message = match &membership.manager_id {
            Some(manager_id) => format!(
                "your request to join was approved; you now report to {manager_id} as {}",
                membership.role.as_str()
            ),
            None => format!("your request to join was approved as {}", membership.role.as_str()),
        };
        Self::new(
            membership.user_id.clone(),
            NotificationKind::JoinRequestApproved,
            request.id.0.clone(),
            message,
            now,
        )
    }
}
