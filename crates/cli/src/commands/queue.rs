use serde::Serialize;
use talentdesk_core::domain::membership::UserId;
use talentdesk_core::domain::time_entry::TimeEntry;

use crate::commands::escalation::approvals;
use crate::commands::{build_runtime, load_config, open_migrated_pool, CommandResult, EXIT_QUERY};

#[derive(Debug, Serialize)]
struct QueueReport {
    manager: UserId,
    pending: Vec<TimeEntry>,
}

pub fn run(manager_id: &str) -> CommandResult {
    let config = match load_config("queue") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("queue") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let manager = UserId::from(manager_id);
    let result = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;
        let pending = approvals(&pool, &config)
            .pending_queue(&manager)
            .await
            .map_err(|error| ("query", error.to_string(), EXIT_QUERY));
        pool.close().await;
        pending
    });

    match result {
        Ok(pending) => CommandResult::report("queue", &QueueReport { manager, pending }),
        Err(failure) => CommandResult::from_failure("queue", failure),
    }
}
