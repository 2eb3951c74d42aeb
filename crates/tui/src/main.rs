mod app;

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    sync::Arc,
};

use backlog_core::{
    config::{self, AppConfig},
    controller::{BacklogController, ControllerSettings},
    notify::ChannelNotifier,
    repository::GameRepository,
    store::{GameStore, JsonFileBackend},
};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config_path = config::ensure_default_config()?;
    let config = AppConfig::load()?;
    tracing::info!(
        config = %config_path.display(),
        store = %config.store_path().display(),
        "Starting backlog"
    );

    let store = GameStore::open(JsonFileBackend::new(config.store_path()))
        .with_context(|| format!("failed to open {}", config.store_path().display()))?;
    let repository = GameRepository::new(store.shared());
    let (notifier, notice_rx) = ChannelNotifier::new();
    let (controller, backlog_rx) = BacklogController::new(
        repository,
        Arc::new(notifier),
        ControllerSettings::from(&config),
    );

    let mut app = app::BacklogApp::new(controller, backlog_rx, notice_rx);
    app.run().await
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("backlog.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
