use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use talentdesk_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    CommandResult { exit_code: 0, output: render(&config) }
}

fn render(config: &AppConfig) -> String {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields = [
        ("database.url", config.database.url.clone(), &["TALENTDESK_DATABASE_URL"][..]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["TALENTDESK_DATABASE_MAX_CONNECTIONS"][..],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["TALENTDESK_DATABASE_TIMEOUT_SECS"][..],
        ),
        (
            "hierarchy.max_depth",
            config.hierarchy.max_depth.to_string(),
            &["TALENTDESK_HIERARCHY_MAX_DEPTH"][..],
        ),
        (
            "hierarchy.max_escalation_hops",
            config.hierarchy.max_escalation_hops.to_string(),
            &["TALENTDESK_HIERARCHY_MAX_ESCALATION_HOPS"][..],
        ),
        (
            "limits.max_bulk_records",
            config.limits.max_bulk_records.to_string(),
            &["TALENTDESK_LIMITS_MAX_BULK_RECORDS"][..],
        ),
        (
            "limits.rate_limit_requests",
            config.limits.rate_limit_requests.to_string(),
            &["TALENTDESK_LIMITS_RATE_LIMIT_REQUESTS"][..],
        ),
        (
            "limits.rate_limit_window_secs",
            config.limits.rate_limit_window_secs.to_string(),
            &["TALENTDESK_LIMITS_RATE_LIMIT_WINDOW_SECS"][..],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["TALENTDESK_LOGGING_LEVEL", "TALENTDESK_LOG_LEVEL"][..],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            &["TALENTDESK_LOGGING_FORMAT", "TALENTDESK_LOG_FORMAT"][..],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_keys) in fields {
        let source = field_source(
            key_path,
            env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {key_path} = {value} (source: {source})"));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_hit = env_keys
        .iter()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(env_key) = env_hit {
        return format!("env ({env_key})");
    }

    if config_file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}
