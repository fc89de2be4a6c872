pub mod config;
pub mod migrate;
pub mod notifications;
pub mod queue;
pub mod requests;
pub mod seed;
pub mod watch;

use std::future::Future;
use std::sync::Arc;

use hostdesk_core::config::{AppConfig, LoadOptions};
use hostdesk_core::notify::{
    NotificationSender, TracingNotificationSender, WebhookNotificationSender,
};
use hostdesk_core::store::CollectionStore;
use hostdesk_core::{
    AlertRegistry, ApplicationError, ChangeBroadcaster, InterfaceError, RequestLifecycle,
    TerminalBell,
};
use hostdesk_db::{connect_with_config, migrations, DbPool, SqlCollectionStore};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: impl Serialize,
    ) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self::success_with(command, message, Some(data)),
            Err(error) => Self::failure(command, "serialization", error.to_string(), 6),
        }
    }

    fn success_with(command: &str, message: impl Into<String>, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Command failure carrying its `error_class` and process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub error_class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl Failure {
    pub fn new(error_class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { error_class, message: message.into(), exit_code }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new("invalid_input", message, 6)
    }

    /// Maps store and lifecycle errors through the interface error classes.
    pub fn operation(error: impl Into<ApplicationError>) -> Self {
        let interface = error.into().into_interface("cli");
        let exit_code = match interface {
            InterfaceError::NotFound { .. } => 7,
            _ => 6,
        };
        Self::new(interface.error_class(), interface.message().to_string(), exit_code)
    }

    fn into_result(self, command: &str) -> CommandResult {
        CommandResult::failure(command, self.error_class, self.message, self.exit_code)
    }
}

/// Everything a command needs once config, runtime, database and schema are ready.
pub struct Desk {
    pub config: AppConfig,
    pub pool: DbPool,
    pub store: Arc<dyn CollectionStore>,
    pub lifecycle: Arc<RequestLifecycle>,
}

impl Desk {
    async fn open(config: AppConfig) -> Result<Self, Failure> {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| Failure::new("db_connectivity", error.to_string(), 4))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| Failure::new("migration", error.to_string(), 5))?;

        let store: Arc<dyn CollectionStore> = Arc::new(SqlCollectionStore::new(pool.clone()));
        let alerts = Arc::new(AlertRegistry::new(Arc::new(TerminalBell), config.alert_interval()));
        let notifier: Arc<dyn NotificationSender> =
            match WebhookNotificationSender::from_config(&config.notifications) {
                Some(webhook) => Arc::new(webhook),
                None => Arc::new(TracingNotificationSender),
            };
        let lifecycle = RequestLifecycle::new(store.clone(), ChangeBroadcaster::default(), alerts)
            .with_settings(config.lifecycle_settings())
            .with_notifier(notifier);

        Ok(Self { config, pool, store, lifecycle: Arc::new(lifecycle) })
    }
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

/// Loads config, starts a current-thread runtime, opens the desk and runs `body` on it.
pub(crate) fn with_desk<F, Fut>(command: &str, body: F) -> CommandResult
where
    F: FnOnce(Desk) -> Fut,
    Fut: Future<Output = Result<CommandResult, Failure>>,
{
    let config = match load_config(command) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let desk = Desk::open(config).await?;
        let pool = desk.pool.clone();
        let result = body(desk).await;
        pool.close().await;
        result
    });

    result.unwrap_or_else(|failure| failure.into_result(command))
}
