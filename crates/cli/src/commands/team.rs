use std::sync::Arc;

use talentdesk_core::audit::TracingAuditSink;
use talentdesk_core::config::AppConfig;
use talentdesk_core::domain::membership::UserId;
use talentdesk_db::repositories::{SqlJoinRequestRepository, SqlMembershipRepository};
use talentdesk_db::{DbPool, TeamOverview, TeamWorkflow};

use crate::commands::{
    build_runtime, load_config, open_migrated_pool, CommandResult, Failure, EXIT_QUERY,
};

pub fn run(user_id: &str) -> CommandResult {
    let config = match load_config("team") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("team") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;
        let overview = load_overview(&pool, &config, &UserId::from(user_id)).await;
        pool.close().await;
        overview
    });

    match result {
        Ok(overview) => CommandResult::report("team", &overview),
        Err(failure) => CommandResult::from_failure("team", failure),
    }
}

async fn load_overview(
    pool: &DbPool,
    config: &AppConfig,
    user_id: &UserId,
) -> Result<TeamOverview, Failure> {
    let workflow = TeamWorkflow::new(
        Arc::new(SqlMembershipRepository::new(pool.clone())),
        Arc::new(SqlJoinRequestRepository::new(pool.clone())),
        config.hierarchy.limits(),
        Arc::new(TracingAuditSink),
    )
    .with_bulk_limit(config.limits.max_bulk_records);
    workflow.overview(user_id).await.map_err(|error| ("query", error.to_string(), EXIT_QUERY))
}
