use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::membership::{MemberRole, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinRequestId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl JoinRequestStatus {
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

/// A user asking to join an agency team. Approval creates (or reactivates)
/// their membership under the approving admin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: JoinRequestId,
    pub user_id: UserId,
    pub requested_role: MemberRole,
    pub status: JoinRequestStatus,
    pub decided_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JoinRequest {
    pub fn new(user_id: impl Into<UserId>, requested_role: MemberRole) -> Self {
        let now = Utc::now();
        Self {
            id: JoinRequestId(format!("JR-{}", Uuid::new_v4())),
            user_id: user_id.into(),
            requested_role,
            status: JoinRequestStatus::Pending,
            decided_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}
