pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "talentdesk",
    about = "Talentdesk operator CLI",
    long_about = "Operate the agency hierarchy store: migrations, demo fixtures, config \
                  inspection, and read-only views of team visibility and approval routing.",
    after_help = "Examples:\n  talentdesk doctor --json\n  talentdesk seed\n  \
                  talentdesk escalation demo-ops-recruiter"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo agency hierarchy and verify its scenarios")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity, and migration status")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Show who a user can see and who reports to them")]
    Team {
        #[arg(help = "User id to resolve the team for")]
        user_id: String,
    },
    #[command(about = "Show which manager would approve a user's time entries")]
    Escalation {
        #[arg(help = "Submitter user id")]
        user_id: String,
    },
    #[command(about = "List pending time entries awaiting a manager's decision")]
    Queue {
        #[arg(help = "Manager user id")]
        manager_id: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Team { user_id } => commands::team::run(&user_id),
        Command::Escalation { user_id } => commands::escalation::run(&user_id),
        Command::Queue { manager_id } => commands::queue::run(&manager_id),
    };

    tracing::debug!(
        event_name = "cli.command.finished",
        exit_code = result.exit_code,
        "command finished"
    );
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
