use std::sync::Arc;

use serde::Serialize;
use talentdesk_core::audit::TracingAuditSink;
use talentdesk_core::config::AppConfig;
use talentdesk_core::domain::membership::UserId;
use talentdesk_core::escalation::EscalationTarget;
use talentdesk_core::rate_limit::RateLimiter;
use talentdesk_db::repositories::{SqlMembershipRepository, SqlTimeEntryRepository};
use talentdesk_db::{ApprovalWorkflow, DbPool};

use crate::commands::{
    build_runtime, load_config, open_migrated_pool, CommandResult, Failure, EXIT_QUERY,
};

#[derive(Debug, Serialize)]
struct EscalationReport {
    submitter: UserId,
    routed_to: Option<EscalationTarget>,
}

pub fn run(user_id: &str) -> CommandResult {
    let config = match load_config("escalation") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("escalation") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let submitter = UserId::from(user_id);
    let result = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;
        let routed = route(&pool, &config, &submitter).await;
        pool.close().await;
        routed
    });

    match result {
        Ok(routed_to) => {
            CommandResult::report("escalation", &EscalationReport { submitter, routed_to })
        }
        Err(failure) => CommandResult::from_failure("escalation", failure),
    }
}

pub(crate) fn approvals(pool: &DbPool, config: &AppConfig) -> ApprovalWorkflow {
    ApprovalWorkflow::new(
        Arc::new(SqlMembershipRepository::new(pool.clone())),
        Arc::new(SqlTimeEntryRepository::new(pool.clone())),
        config.hierarchy.limits(),
        Arc::new(TracingAuditSink),
    )
    .with_rate_limiter(Arc::new(RateLimiter::from_config(&config.limits)))
}

async fn route(
    pool: &DbPool,
    config: &AppConfig,
    submitter: &UserId,
) -> Result<Option<EscalationTarget>, Failure> {
    approvals(pool, config)
        .route(submitter)
        .await
        .map_err(|error| ("query", error.to_string(), EXIT_QUERY))
}
