use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::membership::UserId;
use crate::domain::record::{RecordId, RecordKind};
use crate::errors::DomainError;

pub const DEFAULT_MAX_BULK_RECORDS: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BulkAction {
    Delete,
    Reassign { new_owner_id: UserId },
    UpdateStatus { status: String },
}

impl BulkAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Reassign { .. } => "reassign",
            Self::UpdateStatus { .. } => "update_status",
        }
    }
}

/// Body of a bulk mutation over records of one kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRecordRequest {
    pub kind: RecordKind,
    pub record_ids: Vec<RecordId>,
    #[serde(flatten)]
    pub action: BulkAction,
}

impl BulkRecordRequest {
    pub fn validate(&self, max_records: usize) -> Result<(), DomainError> {
        if self.record_ids.is_empty() {
            return Err(DomainError::InvalidRequest("record_ids must not be empty".to_owned()));
        }
        if self.record_ids.len() > max_records {
            return Err(DomainError::InvalidRequest(format!(
                "bulk requests are limited to {max_records} records, got {}",
                self.record_ids.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.record_ids.len());
        if let Some(duplicate) = self.record_ids.iter().find(|id| !seen.insert(*id)) {
            return Err(DomainError::InvalidRequest(format!(
                "record id `{}` appears more than once",
                duplicate.0
            )));
        }
        if let Some(blank) = self.record_ids.iter().find(|id| id.0.trim().is_empty()) {
            return Err(DomainError::InvalidRequest(format!("record id `{}` is blank", blank.0)));
        }

        match &self.action {
            BulkAction::Delete => Ok(()),
            BulkAction::Reassign { new_owner_id } if new_owner_id.as_str().trim().is_empty() => {
                Err(DomainError::InvalidRequest("new_owner_id must not be blank".to_owned()))
            }
            BulkAction::Reassign { .. } => Ok(()),
            BulkAction::UpdateStatus { status } if status.trim().is_empty() => {
                Err(DomainError::InvalidRequest("status must not be blank".to_owned()))
            }
            BulkAction::UpdateStatus { .. } => Ok(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TimeEntryDecision {
    Approve,
    Reject { reason: String },
}

impl TimeEntryDecision {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject { .. } => "reject",
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Self::Reject { reason } if reason.trim().is_empty() => Err(
                DomainError::InvalidRequest("a rejection reason is required".to_owned()),
            ),
            _ => Ok(()),
        }
    }
}
