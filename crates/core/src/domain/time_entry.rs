use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::AccessError;
use crate::domain::membership::UserId;
use crate::errors::DomainError;
use crate::escalation::ApprovalAuthority;
use crate::requests::TimeEntryDecision;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeEntryId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeEntryStatus {
    Pending,
    Approved,
    Rejected,
}

impl TimeEntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: TimeEntryId,
    pub owner_id: UserId,
    pub work_date: NaiveDate,
    pub minutes: u32,
    pub description: String,
    pub status: TimeEntryStatus,
    pub approved_by: Option<UserId>,
    pub approval_level: Option<u32>,
    pub escalated: bool,
    pub rejection_reason: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    pub fn new(
        owner_id: impl Into<UserId>,
        work_date: NaiveDate,
        minutes: u32,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TimeEntryId(format!("TE-{}", Uuid::new_v4())),
            owner_id: owner_id.into(),
            work_date,
            minutes,
            description: description.into(),
            status: TimeEntryStatus::Pending,
            approved_by: None,
            approval_level: None,
            escalated: false,
            rejection_reason: None,
            decided_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies an approver's decision. The entry must still be pending and the
    /// authority must come from `EscalationRouter::can_approve` for this owner.
    pub fn record_decision(
        &mut self,
        approver: &UserId,
        decision: &TimeEntryDecision,
        authority: &ApprovalAuthority,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !authority.can_approve {
            return Err(DomainError::Access(AccessError::NotApprover {
                approver_id: approver.clone(),
                submitter_id: self.owner_id.clone(),
            }));
        }

        let next = match decision {
            TimeEntryDecision::Approve => TimeEntryStatus::Approved,
            TimeEntryDecision::Reject { .. } => TimeEntryStatus::Rejected,
        };
        if self.status != TimeEntryStatus::Pending {
            return Err(DomainError::InvalidTransition {
                from: self.status.as_str(),
                to: next.as_str(),
            });
        }

        self.status = next;
        self.approved_by = Some(approver.clone());
        self.approval_level = Some(authority.level);
        self.escalated = authority.is_escalated;
        self.rejection_reason = match decision {
            TimeEntryDecision::Approve => None,
            TimeEntryDecision::Reject { reason } => Some(reason.trim().to_owned()),
        };
        self.decided_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::{TimeEntry, TimeEntryStatus};
    use crate::domain::membership::UserId;
    use crate::errors::DomainError;
    use crate::escalation::ApprovalAuthority;
    use crate::requests::TimeEntryDecision;

    fn entry() -> TimeEntry {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date");
        TimeEntry::new("u-leaf", date, 480, "sourcing calls")
    }

    #[test]
    fn escalated_approval_records_level_and_flag() {
        let mut entry = entry();
        let authority = ApprovalAuthority { can_approve: true, is_escalated: true, level: 2 };

        let approver = UserId::from("u-root");
        entry
            .record_decision(&approver, &TimeEntryDecision::Approve, &authority, Utc::now())
            .expect("pending entry should accept approval");

        assert_eq!(entry.status, TimeEntryStatus::Approved);
        assert_eq!(entry.approved_by, Some(UserId::from("u-root")));
        assert_eq!(entry.approval_level, Some(2));
        assert!(entry.escalated);
        assert!(entry.decided_at.is_some());
    }

    #[test]
    fn decided_entry_cannot_be_decided_again() {
        let mut entry = entry();
        let authority = ApprovalAuthority { can_approve: true, is_escalated: false, level: 1 };
        let approver = UserId::from("u-sub");
        entry
            .record_decision(&approver, &TimeEntryDecision::Approve, &authority, Utc::now())
            .expect("first decision");

        let error = entry
            .record_decision(
                &approver,
                &TimeEntryDecision::Reject { reason: "late".to_owned() },
                &authority,
                Utc::now(),
            )
            .expect_err("second decision should fail");

        assert_eq!(error, DomainError::InvalidTransition { from: "approved", to: "rejected" });
    }

    #[test]
    fn decision_without_authority_is_rejected() {
        let mut entry = entry();

        let error = entry
            .record_decision(
                &UserId::from("u-peer"),
                &TimeEntryDecision::Approve,
                &ApprovalAuthority::denied(),
                Utc::now(),
            )
            .expect_err("peer cannot approve");

        assert!(matches!(error, DomainError::Access(_)));
        assert_eq!(entry.status, TimeEntryStatus::Pending);
    }
}
