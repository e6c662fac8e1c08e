//! zkv - A Concurrent Key-Value Server
//!
//! This is the main entry point for the zkv server.
//! It loads configuration, sets up logging, builds the worker pool and
//! runs the server until Ctrl+C or SIGTERM.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use zkv::config::Config;
use zkv::server::Server;

fn print_banner(config: &Config, workers: usize) {
    println!(
        r#"
zkv v{} - Compressed Key-Value Server
──────────────────────────────────────────
Listening on  {}
Store file    {}
Workers       {}

Use Ctrl+C to shutdown gracefully.
"#,
        zkv::VERSION,
        config.bind_address(),
        config.store_path.display(),
        workers
    );
}

fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let workers = config.worker_threads();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .enable_all()
        .build()
        .context("failed to build the Tokio runtime")?;

    print_banner(&config, workers);

    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let server = Server::bind(&config)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;

    info!(
        addr = %server.local_addr(),
        flush_interval_secs = config.flush_interval.as_secs(),
        stats_interval_secs = config.stats_interval.as_secs(),
        final_flush = config.final_flush,
        "Server started"
    );

    server.run_until(shutdown_signal()).await;
    Ok(())
}

/// Completes on Ctrl+C, or on SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
