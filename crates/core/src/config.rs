use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifecycle::LifecycleSettings;

pub const CONFIG_FILE_CANDIDATES: [&str; 2] = ["hostdesk.toml", "config/hostdesk.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub desk: DeskConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct DeskConfig {
    pub alert_interval_ms: u64,
    pub store_retry_limit: u32,
}

#[derive(Clone, Debug)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub channel: String,
    /// Endpoint that receives manager notifications as JSON posts.
    pub webhook_url: Option<String>,
    /// Bearer token sent with every webhook post.
    pub webhook_token: Option<SecretString>,
}

#[derive(Clone, Debug)]
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

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub alert_interval_ms: Option<u64>,
    pub notifications_enabled: Option<bool>,
    pub notification_channel: Option<String>,
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
                url: "sqlite://hostdesk.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            desk: DeskConfig { alert_interval_ms: 2_000, store_retry_limit: 8 },
            notifications: NotificationsConfig {
                enabled: false,
                channel: "reception".to_string(),
                webhook_url: None,
                webhook_token: None,
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
            let expected = options
                .config_path
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_CANDIDATES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn alert_interval(&self) -> Duration {
        Duration::from_millis(self.desk.alert_interval_ms)
    }

    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            notifications_enabled: self.notifications.enabled,
            notification_channel: self.notifications.channel.clone(),
            retry_limit: self.desk.store_retry_limit,
        }
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

        if let Some(desk) = patch.desk {
            if let Some(alert_interval_ms) = desk.alert_interval_ms {
                self.desk.alert_interval_ms = alert_interval_ms;
            }
            if let Some(store_retry_limit) = desk.store_retry_limit {
                self.desk.store_retry_limit = store_retry_limit;
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(enabled) = notifications.enabled {
                self.notifications.enabled = enabled;
            }
            if let Some(channel) = notifications.channel {
                self.notifications.channel = channel;
            }
            if let Some(webhook_url) = notifications.webhook_url {
                self.notifications.webhook_url = Some(webhook_url);
            }
            if let Some(webhook_token) = notifications.webhook_token {
                self.notifications.webhook_token = Some(webhook_token.into());
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
        if let Some(value) = read_env("HOSTDESK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("HOSTDESK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("HOSTDESK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("HOSTDESK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("HOSTDESK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("HOSTDESK_DESK_ALERT_INTERVAL_MS") {
            self.desk.alert_interval_ms = parse_u64("HOSTDESK_DESK_ALERT_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("HOSTDESK_DESK_STORE_RETRY_LIMIT") {
            self.desk.store_retry_limit = parse_u32("HOSTDESK_DESK_STORE_RETRY_LIMIT", &value)?;
        }

        if let Some(value) = read_env("HOSTDESK_NOTIFICATIONS_ENABLED") {
            self.notifications.enabled = parse_bool("HOSTDESK_NOTIFICATIONS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("HOSTDESK_NOTIFICATIONS_CHANNEL") {
            self.notifications.channel = value;
        }
        if let Some(value) = read_env("HOSTDESK_NOTIFICATIONS_WEBHOOK_URL") {
            self.notifications.webhook_url = Some(value);
        }
        if let Some(value) = read_env("HOSTDESK_NOTIFICATIONS_WEBHOOK_TOKEN") {
            self.notifications.webhook_token = Some(value.into());
        }

        let log_level =
            read_env("HOSTDESK_LOGGING_LEVEL").or_else(|| read_env("HOSTDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("HOSTDESK_LOGGING_FORMAT").or_else(|| read_env("HOSTDESK_LOG_FORMAT"));
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
        if let Some(alert_interval_ms) = overrides.alert_interval_ms {
            self.desk.alert_interval_ms = alert_interval_ms;
        }
        if let Some(enabled) = overrides.notifications_enabled {
            self.notifications.enabled = enabled;
        }
        if let Some(channel) = overrides.notification_channel {
            self.notifications.channel = channel;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_desk(&self.desk)?;
        validate_notifications(&self.notifications)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
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

fn validate_desk(desk: &DeskConfig) -> Result<(), ConfigError> {
    if !(100..=60_000).contains(&desk.alert_interval_ms) {
        return Err(ConfigError::Validation(
            "desk.alert_interval_ms must be in range 100..=60000".to_string(),
        ));
    }

    if !(1..=32).contains(&desk.store_retry_limit) {
        return Err(ConfigError::Validation(
            "desk.store_retry_limit must be in range 1..=32".to_string(),
        ));
    }

    Ok(())
}

fn validate_notifications(notifications: &NotificationsConfig) -> Result<(), ConfigError> {
    if notifications.enabled && notifications.channel.trim().is_empty() {
        return Err(ConfigError::Validation(
            "notifications.channel is required when notifications.enabled is true".to_string(),
        ));
    }

    if let Some(url) = notifications.webhook_url.as_deref() {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(
                "notifications.webhook_url must be an http(s) URL".to_string(),
            ));
        }
    } else if notifications.webhook_token.is_some() {
        return Err(ConfigError::Validation(
            "notifications.webhook_token requires notifications.webhook_url".to_string(),
        ));
    }

    let blank_token = notifications
        .webhook_token
        .as_ref()
        .is_some_and(|token| token.expose_secret().trim().is_empty());
    if blank_token {
        return Err(ConfigError::Validation(
            "notifications.webhook_token must not be blank when set".to_string(),
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

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    desk: Option<DeskPatch>,
    notifications: Option<NotificationsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct DeskPatch {
    alert_interval_ms: Option<u64>,
    store_retry_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationsPatch {
    enabled: Option<bool>,
    channel: Option<String>,
    webhook_url: Option<String>,
    webhook_token: Option<String>,
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
    use std::time::Duration;

    use secrecy::ExposeSecret;
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
    fn defaults_are_valid_without_any_file() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.database.url == "sqlite://hostdesk.db", "default database url")?;
        ensure(config.alert_interval() == Duration::from_secs(2), "default alert interval")?;
        ensure(!config.notifications.enabled, "notifications are off by default")?;

        let settings = config.lifecycle_settings();
        ensure(settings.retry_limit == 8, "retry limit should flow into lifecycle settings")?;
        ensure(settings.notification_channel == "reception", "default channel is reception")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_HOSTDESK_WEBHOOK_TOKEN", "hook-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("hostdesk.toml");
            fs::write(
                &path,
                r#"
[notifications]
enabled = true
channel = "front-desk"
webhook_url = "https://hooks.example.test/desk"
webhook_token = "${TEST_HOSTDESK_WEBHOOK_TOKEN}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config
                    .notifications
                    .webhook_token
                    .as_ref()
                    .is_some_and(|token| token.expose_secret() == "hook-from-env"),
                "webhook token should be loaded from environment",
            )?;
            ensure(config.notifications.channel == "front-desk", "channel should come from file")?;
            ensure(
                config.notifications.webhook_url.as_deref()
                    == Some("https://hooks.example.test/desk"),
                "webhook url should come from file",
            )?;
            ensure(
                config.lifecycle_settings().notifications_enabled,
                "enabled flag should flow into lifecycle settings",
            )
        })();

        clear_vars(&["TEST_HOSTDESK_WEBHOOK_TOKEN"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("hostdesk.toml");
        fs::write(&path, "[database]\nurl = \"${HOSTDESK_TEST_UNSET_VAR}\"\n")
            .map_err(|err| err.to_string())?;

        let error =
            match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
            {
                Ok(_) => return Err("expected interpolation failure".to_string()),
                Err(error) => error,
            };
        ensure(
            matches!(error, ConfigError::MissingEnvInterpolation { ref var } if var == "HOSTDESK_TEST_UNSET_VAR"),
            "error should name the missing variable",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("HOSTDESK_LOG_LEVEL", "warn");
        env::set_var("HOSTDESK_LOG_FORMAT", "pretty");

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

        clear_vars(&["HOSTDESK_LOG_LEVEL", "HOSTDESK_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("HOSTDESK_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("HOSTDESK_DESK_ALERT_INTERVAL_MS", "750");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("hostdesk.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[desk]
alert_interval_ms = 5000
store_retry_limit = 4

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
            ensure(config.desk.alert_interval_ms == 750, "env alert interval should beat file")?;
            ensure(config.desk.store_retry_limit == 4, "file retry limit should beat default")?;
            Ok(())
        })();

        clear_vars(&["HOSTDESK_DATABASE_URL", "HOSTDESK_DESK_ALERT_INTERVAL_MS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("HOSTDESK_DESK_ALERT_INTERVAL_MS", "5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("desk.alert_interval_ms")
            );
            ensure(has_message, "validation failure should mention desk.alert_interval_ms")
        })();

        clear_vars(&["HOSTDESK_DESK_ALERT_INTERVAL_MS"]);
        result
    }

    #[test]
    fn enabled_notifications_need_a_channel() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                notifications_enabled: Some(true),
                notification_channel: Some("  ".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        ensure(
            matches!(result, Err(ConfigError::Validation(ref message)) if message.contains("notifications.channel")),
            "blank channel should be rejected when notifications are enabled",
        )
    }

    #[test]
    fn invalid_numeric_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("HOSTDESK_DESK_STORE_RETRY_LIMIT", "many");
        let result = AppConfig::load(LoadOptions::default());
        clear_vars(&["HOSTDESK_DESK_STORE_RETRY_LIMIT"]);

        ensure(
            matches!(result, Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "HOSTDESK_DESK_STORE_RETRY_LIMIT"),
            "non-numeric retry limit should be an invalid override",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("HOSTDESK_NOTIFICATIONS_WEBHOOK_URL", "https://hooks.example.test/desk");
        env::set_var("HOSTDESK_NOTIFICATIONS_WEBHOOK_TOKEN", "hook-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("hook-secret-value"),
                "debug output should not contain the webhook token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["HOSTDESK_NOTIFICATIONS_WEBHOOK_URL", "HOSTDESK_NOTIFICATIONS_WEBHOOK_TOKEN"]);
        result
    }

    #[test]
    fn webhook_token_without_endpoint_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("HOSTDESK_NOTIFICATIONS_WEBHOOK_TOKEN", "hook-secret-value");
        let missing_url = AppConfig::load(LoadOptions::default());
        env::set_var("HOSTDESK_NOTIFICATIONS_WEBHOOK_URL", "hooks.example.test/desk");
        let bad_scheme = AppConfig::load(LoadOptions::default());
        clear_vars(&["HOSTDESK_NOTIFICATIONS_WEBHOOK_URL", "HOSTDESK_NOTIFICATIONS_WEBHOOK_TOKEN"]);

        ensure(
            matches!(missing_url, Err(ConfigError::Validation(ref message)) if message.contains("requires notifications.webhook_url")),
            "a token with nowhere to send it should fail validation",
        )?;
        ensure(
            matches!(bad_scheme, Err(ConfigError::Validation(ref message)) if message.contains("http(s)")),
            "a webhook url without a scheme should fail validation",
        )
    }
}
