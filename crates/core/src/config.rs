use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hierarchy::{HierarchyLimits, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ESCALATION_HOPS};
use crate::requests::DEFAULT_MAX_BULK_RECORDS;

pub const DEFAULT_CONFIG_FILE: &str = "talentdesk.toml";

#[derive(Clone, Debug, Serialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub hierarchy: HierarchyConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct HierarchyConfig {
    pub max_depth: u32,
    pub max_escalation_hops: u32,
}

impl HierarchyConfig {
    pub fn limits(&self) -> HierarchyLimits {
        HierarchyLimits { max_depth: self.max_depth, max_escalation_hops: self.max_escalation_hops }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct LimitsConfig {
    pub max_bulk_records: usize,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub max_depth: Option<u32>,
    pub max_escalation_hops: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://talentdesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            hierarchy: HierarchyConfig {
                max_depth: DEFAULT_MAX_DEPTH,
                max_escalation_hops: DEFAULT_MAX_ESCALATION_HOPS,
            },
            limits: LimitsConfig {
                max_bulk_records: DEFAULT_MAX_BULK_RECORDS,
                rate_limit_requests: 60,
                rate_limit_window_secs: 60,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(hierarchy) = patch.hierarchy {
            if let Some(max_depth) = hierarchy.max_depth {
                self.hierarchy.max_depth = max_depth;
            }
            if let Some(max_escalation_hops) = hierarchy.max_escalation_hops {
                self.hierarchy.max_escalation_hops = max_escalation_hops;
            }
        }

        if let Some(limits) = patch.limits {
            if let Some(max_bulk_records) = limits.max_bulk_records {
                self.limits.max_bulk_records = max_bulk_records;
            }
            if let Some(rate_limit_requests) = limits.rate_limit_requests {
                self.limits.rate_limit_requests = rate_limit_requests;
            }
            if let Some(rate_limit_window_secs) = limits.rate_limit_window_secs {
                self.limits.rate_limit_window_secs = rate_limit_window_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TALENTDESK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TALENTDESK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("TALENTDESK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TALENTDESK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TALENTDESK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TALENTDESK_HIERARCHY_MAX_DEPTH") {
            self.hierarchy.max_depth = parse_u32("TALENTDESK_HIERARCHY_MAX_DEPTH", &value)?;
        }
        if let Some(value) = read_env("TALENTDESK_HIERARCHY_MAX_ESCALATION_HOPS") {
            self.hierarchy.max_escalation_hops =
                parse_u32("TALENTDESK_HIERARCHY_MAX_ESCALATION_HOPS", &value)?;
        }

        if let Some(value) = read_env("TALENTDESK_LIMITS_MAX_BULK_RECORDS") {
            self.limits.max_bulk_records =
                parse_usize("TALENTDESK_LIMITS_MAX_BULK_RECORDS", &value)?;
        }
        if let Some(value) = read_env("TALENTDESK_LIMITS_RATE_LIMIT_REQUESTS") {
            self.limits.rate_limit_requests =
                parse_u32("TALENTDESK_LIMITS_RATE_LIMIT_REQUESTS", &value)?;
        }
        if let Some(value) = read_env("TALENTDESK_LIMITS_RATE_LIMIT_WINDOW_SECS") {
            self.limits.rate_limit_window_secs =
                parse_u64("TALENTDESK_LIMITS_RATE_LIMIT_WINDOW_SECS", &value)?;
        }

        let log_level =
            read_env("TALENTDESK_LOGGING_LEVEL").or_else(|| read_env("TALENTDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TALENTDESK_LOGGING_FORMAT").or_else(|| read_env("TALENTDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(max_depth) = overrides.max_depth {
            self.hierarchy.max_depth = max_depth;
        }
        if let Some(max_escalation_hops) = overrides.max_escalation_hops {
            self.hierarchy.max_escalation_hops = max_escalation_hops;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_hierarchy(&self.hierarchy)?;
        validate_limits(&self.limits)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_hierarchy(hierarchy: &HierarchyConfig) -> Result<(), ConfigError> {
    if hierarchy.max_depth == 0 || hierarchy.max_depth > 64 {
        return Err(ConfigError::Validation(
            "hierarchy.max_depth must be in range 1..=64".to_string(),
        ));
    }

    if hierarchy.max_escalation_hops == 0 || hierarchy.max_escalation_hops > hierarchy.max_depth {
        return Err(ConfigError::Validation(format!(
            "hierarchy.max_escalation_hops must be in range 1..={}",
            hierarchy.max_depth
        )));
    }

    Ok(())
}

fn validate_limits(limits: &LimitsConfig) -> Result<(), ConfigError> {
    if limits.max_bulk_records == 0 || limits.max_bulk_records > 1_000 {
        return Err(ConfigError::Validation(
            "limits.max_bulk_records must be in range 1..=1000".to_string(),
        ));
    }

    if limits.rate_limit_requests == 0 {
        return Err(ConfigError::Validation(
            "limits.rate_limit_requests must be greater than zero".to_string(),
        ));
    }

    if limits.rate_limit_window_secs == 0 || limits.rate_limit_window_secs > 3_600 {
        return Err(ConfigError::Validation(
            "limits.rate_limit_window_secs must be in range 1..=3600".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    hierarchy: Option<HierarchyPatch>,
    limits: Option<LimitsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct HierarchyPatch {
    max_depth: Option<u32>,
    max_escalation_hops: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LimitsPatch {
    max_bulk_records: Option<usize>,
    rate_limit_requests: Option<u32>,
    rate_limit_window_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_TALENTDESK_DB_PATH", "/tmp/agency.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("talentdesk.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://${TEST_TALENTDESK_DB_PATH}"

[hierarchy]
max_depth = 12
max_escalation_hops = 4
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite:///tmp/agency.db",
                "database url should be interpolated from environment",
            )?;
            ensure(config.hierarchy.limits().max_depth == 12, "max depth should come from file")?;
            ensure(
                config.hierarchy.limits().max_escalation_hops == 4,
                "escalation hops should come from file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_TALENTDESK_DB_PATH"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["TEST_TALENTDESK_UNSET"]);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("talentdesk.toml");
        fs::write(&path, "[database]\nurl = \"${TEST_TALENTDESK_UNSET}\"\n")
            .map_err(|err| err.to_string())?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => return Err("expected interpolation failure".to_string()),
                Err(error) => error,
            };
        let names_variable = matches!(
            error,
            ConfigError::MissingEnvInterpolation { ref var } if var == "TEST_TALENTDESK_UNSET"
        );
        ensure(names_variable, "missing variable should be named in the error")
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TALENTDESK_LOG_LEVEL", "warn");
        env::set_var("TALENTDESK_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["TALENTDESK_LOG_LEVEL", "TALENTDESK_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TALENTDESK_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("TALENTDESK_LIMITS_MAX_BULK_RECORDS", "25");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("talentdesk.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[limits]
max_bulk_records = 10
rate_limit_requests = 5

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.limits.max_bulk_records == 25, "env bulk limit should win over file")?;
            ensure(
                config.limits.rate_limit_requests == 5,
                "file rate limit should win over default",
            )?;
            Ok(())
        })();

        clear_vars(&["TALENTDESK_DATABASE_URL", "TALENTDESK_LIMITS_MAX_BULK_RECORDS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TALENTDESK_HIERARCHY_MAX_ESCALATION_HOPS", "40");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("hierarchy.max_escalation_hops")
            );
            ensure(has_message, "validation failure should mention hierarchy.max_escalation_hops")
        })();

        clear_vars(&["TALENTDESK_HIERARCHY_MAX_ESCALATION_HOPS"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TALENTDESK_DATABASE_MAX_CONNECTIONS", "many");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected invalid override failure".to_string()),
            Err(error) => ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. }
                    if key == "TALENTDESK_DATABASE_MAX_CONNECTIONS"),
                "invalid override should name the variable",
            ),
        };

        clear_vars(&["TALENTDESK_DATABASE_MAX_CONNECTIONS"]);
        result
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.hierarchy.limits(), crate::hierarchy::HierarchyLimits::default());
    }
}
