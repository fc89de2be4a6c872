use std::process::ExitCode;

use anyhow::anyhow;
use hostdesk_core::config::{AppConfig, LoadOptions};

fn main() -> anyhow::Result<ExitCode> {
    // Config errors are reported by the command itself; logging falls back to defaults.
    let logging = AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    hostdesk_cli::init_logging(&logging).map_err(|error| anyhow!(error))?;

    Ok(hostdesk_cli::run())
}
