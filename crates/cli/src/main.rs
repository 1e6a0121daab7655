use std::process::ExitCode;

fn main() -> ExitCode {
    talentdesk_cli::run()
}
