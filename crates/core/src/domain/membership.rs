use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Contributor,
}

impl MemberRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Contributor => "contributor",
        }
    }
}

impl std::str::FromStr for MemberRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "contributor" | "recruiter" => Ok(Self::Contributor),
            other => Err(DomainError::InvalidRequest(format!(
                "unsupported member role `{other}` (expected admin|contributor)"
            ))),
        }
    }
}

/// A recruiter profile inside an agency team.
///
/// `manager_id` points at the admin this member reports to. Memberships are
/// deactivated rather than deleted, so an inactive row keeps its position in
/// the tree and becomes reachable again when reactivated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub user_id: UserId,
    pub is_active: bool,
    pub role: MemberRole,
    pub manager_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(user_id: impl Into<UserId>, role: MemberRole, manager_id: Option<UserId>) -> Self {
        let now = Utc::now();
        Self {
            id: MembershipId(format!("MEM-{}", Uuid::new_v4())),
            user_id: user_id.into(),
            is_active: true,
            role,
            manager_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin
    }

    pub fn is_active_admin(&self) -> bool {
        self.is_active && self.is_admin()
    }

    /// Top of a hierarchy tree: an admin nobody manages.
    pub fn is_root_admin(&self) -> bool {
        self.is_admin() && self.manager_id.is_none()
    }

    pub fn reports_to(&self, manager_id: &UserId) -> bool {
        self.manager_id.as_ref() == Some(manager_id)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
