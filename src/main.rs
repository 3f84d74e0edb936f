mod app;
mod config;
mod error;
mod hardware;
mod input;
mod library;
mod logging;
mod messages;
mod services;

use app::App;
use config::Config;

use anyhow::Result;
use tokio::signal::unix::{SignalKind, signal};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::load()?;
    logging::init(&config.console);

    tracing::info!("Starting tvd");
    tracing::debug!("Effective config: {}", config.summary()?);
    config.validate()?;

    let app = App::new(&config);
    app.run(shutdown_signal()).await?;

    tracing::info!("tvd shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            tracing::warn!("Failed to install SIGTERM handler: {}", e);
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Received SIGINT"),
                Err(_) => std::future::pending::<()>().await,
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
        _ = terminate.recv() => tracing::info!("Received SIGTERM"),
    }
}
