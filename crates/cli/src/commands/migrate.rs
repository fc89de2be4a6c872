use crate::commands::{with_desk, CommandResult};

/// Opening the desk already connects and applies pending migrations.
pub fn run() -> CommandResult {
    with_desk("migrate", |desk| async move {
        let applied = hostdesk_db::migrations::MIGRATOR.iter().count();
        tracing::info!(
            event_name = "cli.migrate.completed",
            database_url = %desk.config.database.url,
            known_migrations = applied,
            "migrations applied"
        );
        Ok(CommandResult::success("migrate", "applied pending migrations"))
    })
}
