use serde::{Deserialize, Serialize};

use crate::domain::membership::UserId;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Candidate,
    Resume,
    Interview,
    Placement,
    TimeEntry,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::Resume => "resume",
            Self::Interview => "interview",
            Self::Placement => "placement",
            Self::TimeEntry => "time_entry",
        }
    }
}

/// Any business record whose visibility follows its owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub id: RecordId,
    pub kind: RecordKind,
    pub owner_id: UserId,
}
