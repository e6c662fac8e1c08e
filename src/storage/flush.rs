//! Background Flush Task
//!
//! `set` never writes to disk. Instead this task wakes up on a fixed
//! interval, test-and-clears the store's dirty flag and, if it was set,
//! writes the whole store once. A burst of writes inside one interval is
//! coalesced into a single flush, and no change waits longer than one
//! interval to reach the disk.
//!
//! ## Design
//!
//! The flush runs as a Tokio task and:
//! 1. Sleeps for the configured interval (default: 5s)
//! 2. Wakes up and calls [`KeyValueStore::flush_if_dirty`] on the blocking pool
//! 3. Logs failures; the store stays dirty so the next tick retries
//!
//! The task is owned by a [`FlushTask`] handle. [`FlushTask::stop`] signals
//! the loop and waits for it to exit.

use crate::storage::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

/// Configuration for the flush task.
#[derive(Debug, Clone)]
pub struct FlushConfig {
    /// Interval between dirty checks (default: 5s)
    pub interval: Duration,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// A handle to the running flush task.
///
/// Dropping the handle signals the task to stop without waiting for it.
#[derive(Debug)]
pub struct FlushTask {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,

    /// The loop itself
    handle: Option<JoinHandle<()>>,
}

impl FlushTask {
    /// Starts the flush loop as a background task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use zkv::storage::{FlushConfig, FlushTask, KeyValueStore};
    /// use std::sync::Arc;
    ///
    /// let store = Arc::new(KeyValueStore::open("config.txt"));
    /// let flusher = FlushTask::start(Arc::clone(&store), FlushConfig::default());
    ///
    /// // ...
    ///
    /// flusher.stop().await;
    /// ```
    pub fn start(store: Arc<KeyValueStore>, config: FlushConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(flush_loop(store, config.clone(), shutdown_rx));

        info!(
            interval_ms = config.interval.as_millis() as u64,
            "Background flush task started"
        );

        Self {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// Stops the flush loop and waits for it to finish.
    ///
    /// A flush already in progress completes first. This does not flush on
    /// its own; callers that want a final write call
    /// [`KeyValueStore::flush_if_dirty`] afterwards.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Flush task terminated abnormally");
            }
        }

        info!("Background flush task stopped");
    }
}

impl Drop for FlushTask {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// The main flush loop.
async fn flush_loop(
    store: Arc<KeyValueStore>,
    config: FlushConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Flush task received shutdown signal");
                    return;
                }
            }
        }

        if !store.is_dirty() {
            trace!("Store clean, nothing to flush");
            continue;
        }

        let flushing = Arc::clone(&store);
        match tokio::task::spawn_blocking(move || flushing.flush_if_dirty()).await {
            Ok(Ok(true)) => debug!(keys = store.len(), "Store flushed"),
            Ok(Ok(false)) => {}
            Ok(Err(e)) => error!(
                path = %store.path().display(),
                error = %e,
                "Failed to persist store, will retry"
            ),
            Err(e) => error!(error = %e, "Flush worker panicked"),
        }
    }
}
