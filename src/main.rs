//! Binary entry point: load the environment, validate configuration, wire
//! up shutdown, run the watcher.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use reviewbell::api::StatusClient;
use reviewbell::notify::TelegramNotifier;
use reviewbell::{Config, ReviewWatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; deployments may set the environment directly.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // The single fatal condition: incomplete configuration at startup.
    let config = Config::from_env()
        .inspect_err(|e| tracing::error!("configuration check failed: {}", e))?;

    let api = Arc::new(StatusClient::new(&config));
    let notifier = Arc::new(TelegramNotifier::new(&config));

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_cancel.cancel();
        }
    });

    ReviewWatcher::new(api, notifier, cancel).run().await;
    Ok(())
}
