//! Server Lifecycle
//!
//! [`Server`] owns everything that lives for the whole process: the
//! listener, the shared store and counters, and the two background tasks.
//! Nothing is global; the background loops are started when the server is
//! bound and joined when it shuts down.
//!
//! ## Shutdown Order
//!
//! ```text
//! 1. stop accepting (listener dropped)
//! 2. wait for in-flight connections, up to the drain timeout
//! 3. stop + join the stats reporter and the flush task
//! 4. final flush of the store (when enabled)
//! ```

use crate::commands::CommandHandler;
use crate::config::Config;
use crate::connection::{handle_connection, ConnectionStats};
use crate::stats::{ReporterConfig, StatsReporter, StatsTracker};
use crate::storage::{FlushConfig, FlushTask, KeyValueStore};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// How long shutdown waits for open connections to finish
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) does not spin the loop
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// A bound, running server.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    store: Arc<KeyValueStore>,
    stats: Arc<StatsTracker>,
    connections: Arc<ConnectionStats>,
    flusher: FlushTask,
    reporter: StatsReporter,
    final_flush: bool,
    drain_timeout: Duration,
}

impl Server {
    /// Loads the store, binds the listener and starts the background tasks.
    ///
    /// Failing to bind is the only error; store problems are logged and
    /// the server starts with an empty store.
    pub async fn bind(config: &Config) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind_address()).await?;
        let local_addr = listener.local_addr()?;

        let store_path = config.store_path.clone();
        let store = tokio::task::spawn_blocking(move || KeyValueStore::open(store_path))
            .await
            .map(Arc::new)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let stats = Arc::new(StatsTracker::new());
        let connections = Arc::new(ConnectionStats::new());

        let flusher = FlushTask::start(
            Arc::clone(&store),
            FlushConfig {
                interval: config.flush_interval,
            },
        );
        let reporter = StatsReporter::start(
            Arc::clone(&stats),
            Some(Arc::clone(&connections)),
            ReporterConfig {
                interval: config.stats_interval,
            },
        );

        info!(addr = %local_addr, store = %store.path().display(), "Listening");

        Ok(Self {
            listener,
            local_addr,
            store,
            stats,
            connections,
            flusher,
            reporter,
            final_flush: config.final_flush,
            drain_timeout: DRAIN_TIMEOUT,
        })
    }

    /// Overrides how long shutdown waits for open connections.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the shared store.
    pub fn store(&self) -> &Arc<KeyValueStore> {
        &self.store
    }

    /// Returns the shared access counters.
    pub fn stats(&self) -> &Arc<StatsTracker> {
        &self.stats
    }

    /// Returns the connection metrics.
    pub fn connection_stats(&self) -> &Arc<ConnectionStats> {
        &self.connections
    }

    /// Accepts connections until `shutdown` completes, then shuts down.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let handler = CommandHandler::new(Arc::clone(&self.store), Arc::clone(&self.stats));

        tokio::select! {
            _ = accept_loop(&self.listener, handler, Arc::clone(&self.connections)) => {}
            _ = shutdown => {
                info!("Shutdown signal received, stopping server...");
            }
        }

        self.shutdown().await;
    }

    /// Stops accepting, drains connections, joins the background tasks and
    /// performs the final flush.
    pub async fn shutdown(self) {
        let Server {
            listener,
            store,
            connections,
            flusher,
            reporter,
            final_flush,
            drain_timeout,
            ..
        } = self;

        drop(listener);

        if !drain_connections(&connections, drain_timeout).await {
            warn!(
                active = connections.active_connections.load(Ordering::Relaxed),
                "Connections still open after drain timeout"
            );
        }

        reporter.stop().await;
        flusher.stop().await;

        if final_flush {
            let flushing = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || flushing.flush_if_dirty()).await {
                Ok(Ok(true)) => info!(keys = store.len(), "Final flush complete"),
                Ok(Ok(false)) => {}
                Ok(Err(e)) => error!(error = %e, "Final flush failed"),
                Err(e) => error!(error = %e, "Final flush worker panicked"),
            }
        }

        info!("Server shutdown complete");
    }
}

/// Accepts connections forever, spawning one handler task per connection.
///
/// Errors are logged and never end the loop.
pub async fn accept_loop(
    listener: &TcpListener,
    handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
                }

                let handler = handler.clone();
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}

/// Waits until no connection is active or `timeout` elapses.
///
/// Returns true if every connection closed in time.
async fn drain_connections(stats: &ConnectionStats, timeout: Duration) -> bool {
    let wait = async {
        while stats.active_connections.load(Ordering::Acquire) > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };

    tokio::time::timeout(timeout, wait).await.is_ok()
}
