pub mod access;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod escalation;
pub mod hierarchy;
pub mod rate_limit;
pub mod requests;
pub mod team;

pub use access::{AccessAuthority, AccessError, AccessPartition, VisibilitySet};
pub use audit::{AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use domain::join_request::{JoinRequest, JoinRequestId, JoinRequestStatus};
pub use domain::membership::{MemberRole, Membership, MembershipId, UserId};
pub use domain::notification::{Notification, NotificationId, NotificationKind};
pub use domain::record::{RecordId, RecordKind, RecordRef};
pub use domain::time_entry::{TimeEntry, TimeEntryId, TimeEntryStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use escalation::{ApprovalAuthority, EscalationRouter, EscalationTarget, ManagerQueue};
pub use hierarchy::{HierarchyLimits, HierarchyResolver, MembershipSnapshot, MembershipStore};
pub use rate_limit::{RateDecision, RateLimiter};
pub use requests::{BulkAction, BulkRecordRequest, TimeEntryDecision};
pub use team::{JoinApproval, TeamRoster};
