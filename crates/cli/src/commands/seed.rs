use talentdesk_db::fixtures::ScenarioSeedInfo;
use talentdesk_db::DemoAgencyDataset;

use crate::commands::{
    build_runtime, load_config, open_migrated_pool, CommandResult, Failure, EXIT_MIGRATION,
    EXIT_VERIFICATION,
};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_migrated_pool(&config).await?;

        let seeded = DemoAgencyDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_MIGRATION))?;
        let verification = DemoAgencyDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_VERIFICATION))?;

        let outcome: Result<Vec<ScenarioSeedInfo>, Failure> = if verification.all_present {
            Ok(seeded.scenarios)
        } else {
            let failed = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_message(&failed), EXIT_VERIFICATION))
        };

        pool.close().await;
        outcome
    });

    match result {
        Ok(scenarios) => {
            let lines = scenarios
                .iter()
                .map(|scenario| {
                    format!(
                        "  - {}: {} ({})",
                        scenario.name, scenario.submitter, scenario.description
                    )
                })
                .collect::<Vec<_>>();
            CommandResult::success(
                "seed",
                format!("demo agency loaded with escalation scenarios:\n{}", lines.join("\n")),
            )
        }
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_message_names_failed_checks() {
        assert_eq!(
            verification_message(&["demo-ops-lead", "skip-inactive-manager"]),
            "seed verification failed for checks: demo-ops-lead, skip-inactive-manager"
        );
    }

    #[test]
    fn verification_message_falls_back_when_no_labels() {
        assert_eq!(verification_message(&[]), "some seed data failed to load");
    }
}
