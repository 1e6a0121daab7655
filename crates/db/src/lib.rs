pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod snapshot;
pub mod workflows;

pub use connection::{connect, connect_from_config, connect_with_settings, DbPool};
pub use fixtures::{DemoAgencyDataset, SeedResult, VerificationResult};
pub use snapshot::load_snapshot;
pub use workflows::{ApprovalWorkflow, SubmissionReceipt, TeamOverview, TeamWorkflow};
