use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use hostdesk_core::config::{AppConfig, CONFIG_FILE_CANDIDATES};
use secrecy::ExposeSecret;
use serde::Serialize;
use toml::Value;

use crate::commands::{load_config, CommandResult};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: &'static str,
    pub value: String,
    pub source: String,
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let entries = effective_entries(&config, config_file_doc.as_ref(), config_file_path.as_deref());

    CommandResult::success_with_data(
        "config",
        "effective config (source precedence: env > file > default)",
        entries,
    )
}

pub fn effective_entries(
    config: &AppConfig,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> Vec<ConfigEntry> {
    let webhook_token = match &config.notifications.webhook_token {
        Some(token) => redact_token(token.expose_secret()),
        None => "<unset>".to_string(),
    };

    let webhook_url =
        config.notifications.webhook_url.clone().unwrap_or_else(|| "<unset>".to_string());

    let fields: [(&'static str, String, &[&str]); 11] = [
        ("database.url", config.database.url.clone(), &["HOSTDESK_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["HOSTDESK_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["HOSTDESK_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "desk.alert_interval_ms",
            config.desk.alert_interval_ms.to_string(),
            &["HOSTDESK_DESK_ALERT_INTERVAL_MS"],
        ),
        (
            "desk.store_retry_limit",
            config.desk.store_retry_limit.to_string(),
            &["HOSTDESK_DESK_STORE_RETRY_LIMIT"],
        ),
        (
            "notifications.enabled",
            config.notifications.enabled.to_string(),
            &["HOSTDESK_NOTIFICATIONS_ENABLED"],
        ),
        (
            "notifications.channel",
            config.notifications.channel.clone(),
            &["HOSTDESK_NOTIFICATIONS_CHANNEL"],
        ),
        ("notifications.webhook_url", webhook_url, &["HOSTDESK_NOTIFICATIONS_WEBHOOK_URL"]),
        ("notifications.webhook_token", webhook_token, &["HOSTDESK_NOTIFICATIONS_WEBHOOK_TOKEN"]),
        (
            "logging.level",
            config.logging.level.clone(),
            &["HOSTDESK_LOGGING_LEVEL", "HOSTDESK_LOG_LEVEL"],
        ),
        (
            "logging.format",
            config.logging.format.as_str().to_string(),
            &["HOSTDESK_LOGGING_FORMAT", "HOSTDESK_LOG_FORMAT"],
        ),
    ];

    fields
        .into_iter()
        .map(|(key, value, env_keys)| ConfigEntry {
            key,
            value,
            source: field_source(key, env_keys, config_file_doc, config_file_path),
        })
        .collect()
}

fn detect_config_path() -> Option<PathBuf> {
    CONFIG_FILE_CANDIDATES.into_iter().map(PathBuf::from).find(|path| path.exists())
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
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
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

/// Keeps at most the last four characters of long tokens.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() < 12 {
        return "<redacted>".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}
