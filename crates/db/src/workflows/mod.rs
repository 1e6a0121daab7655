//! Async request handlers that pair the core rules with the repositories.
//!
//! Each call loads a fresh membership snapshot, asks the core for a decision,
//! then persists the result. Nothing here caches hierarchy state.

use talentdesk_core::audit::{AuditCategory, AuditEvent, AuditOutcome};
use talentdesk_core::domain::membership::UserId;

pub mod approvals;
pub mod team;

pub use approvals::{ApprovalWorkflow, SubmissionReceipt};
pub use team::{TeamOverview, TeamWorkflow};

fn audit_event(
    correlation_id: &str,
    event_type: &str,
    category: AuditCategory,
    actor: &UserId,
    outcome: AuditOutcome,
    subject_id: impl Into<String>,
) -> AuditEvent {
    AuditEvent::new(
        Some(subject_id.into()),
        correlation_id,
        event_type,
        category,
        actor.clone(),
        outcome,
    )
}
