//! Block server host.
//!
//! Loads `blockhost.toml`, sizes the tokio worker pool from the resolved
//! `num_threads` setting and runs the server until a termination signal
//! arrives or a panic escalates.

mod cli;
mod config;
mod logging;

use anyhow::Context;
use block_server::config::{resolve_worker_count, NUM_THREADS_SETTING};
use block_server::{NoopEvents, Server, ServerError, SettingsProvider, StaticMods, TomlSettings, TracingSink};
use cli::CliArgs;
use config::AppConfig;
use std::sync::Arc;
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // Configuration is loaded before logging so the file can choose the level.
    let mut config = AppConfig::load_from_file(&args.config_path)
        .with_context(|| format!("Failed to load {}", args.config_path.display()))?;
    config.apply_cli(&args);
    config.validate().context("Configuration validation failed")?;

    logging::setup_logging(&config.logging)?;

    let settings = config.server_settings();
    let workers = resolve_worker_count(settings.get_setting(NUM_THREADS_SETTING).as_deref());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .thread_name("blockhost-worker")
        .enable_all()
        .build()
        .context("Failed to build the tokio runtime")?;

    info!("🚀 blockhost v{} starting with {} worker thread(s)", env!("CARGO_PKG_VERSION"), workers);
    info!("📂 Config: {}", args.config_path.display());

    runtime.block_on(run(settings))
}

async fn run(settings: TomlSettings) -> anyhow::Result<()> {
    let server = Server::startup(
        &settings,
        &mut StaticMods::new(),
        Arc::new(NoopEvents),
        Arc::new(TracingSink),
    )?;
    let acceptor = server.bind()?;

    let server = Arc::new(server);
    let serving = {
        let server = server.clone();
        tokio::spawn(async move { server.serve(acceptor).await })
    };

    info!("🛑 Press Ctrl+C to gracefully shutdown");
    tokio::select! {
        interrupted = tokio::signal::ctrl_c() => {
            match interrupted {
                Ok(()) => info!("📡 Interrupt received, shutting down"),
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
            server.shutdown();
        }
        terminated = terminate_signal() => {
            match terminated {
                Ok(()) => info!("📡 Termination requested, shutting down"),
                Err(e) => error!("Failed to listen for SIGTERM: {}", e),
            }
            server.shutdown();
        }
        _ = server.stopped() => {}
    }

    let result = serving.await.context("Server task failed")?;
    match result {
        Ok(()) => {
            info!("✅ blockhost shutdown complete");
            Ok(())
        }
        Err(ServerError::Panicked) => {
            error!("❌ Server stopped after a fatal error");
            Err(ServerError::Panicked.into())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
async fn terminate_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate_signal() -> std::io::Result<()> {
    std::future::pending().await
}
