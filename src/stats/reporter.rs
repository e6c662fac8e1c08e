//! Background Stats Reporter
//!
//! Every interval the reporter logs the running totals and the counts for
//! the window that just ended, then resets the window counters.
//!
//! Increments keep happening while a report is being built, so a window
//! can be off by the handful of operations that raced with the reset.
//! This is telemetry, not accounting.

use crate::connection::ConnectionStats;
use crate::stats::StatsTracker;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Configuration for the stats reporter.
#[derive(Debug, Clone)]
pub struct ReporterConfig {
    /// Interval between reports (default: 5s)
    pub interval: Duration,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// A handle to the running reporter.
///
/// Dropping the handle signals the task to stop without waiting for it.
/// Use [`StatsReporter::stop`] to be sure no report is logged afterwards.
#[derive(Debug)]
pub struct StatsReporter {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl StatsReporter {
    /// Starts the report loop as a background task.
    ///
    /// `connections` adds connection-level counters to each report.
    pub fn start(
        stats: Arc<StatsTracker>,
        connections: Option<Arc<ConnectionStats>>,
        config: ReporterConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(report_loop(stats, connections, config.clone(), shutdown_rx));

        info!(
            interval_ms = config.interval.as_millis() as u64,
            "Stats reporter started"
        );

        Self {
            shutdown_tx,
            handle: Some(handle),
        }
    }

    /// Stops the reporter and waits for it to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Stats reporter terminated abnormally");
            }
        }

        info!("Stats reporter stopped");
    }
}

impl Drop for StatsReporter {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn report_loop(
    stats: Arc<StatsTracker>,
    connections: Option<Arc<ConnectionStats>>,
    config: ReporterConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Stats reporter received shutdown signal");
                    return;
                }
            }
        }

        report(&stats, connections.as_deref(), config.interval);
    }
}

/// Logs one report and resets the window counters.
fn report(stats: &StatsTracker, connections: Option<&ConnectionStats>, window: Duration) {
    let totals = stats.totals();
    info!(
        target: "zkv::stats",
        gets = totals.total_reads,
        sets = totals.total_writes,
        keys = stats.tracked_keys(),
        "Total"
    );

    let (window_gets, window_sets) = stats.take_window();
    info!(
        target: "zkv::stats",
        gets = window_gets,
        sets = window_sets,
        window_secs = window.as_secs_f64(),
        "Last window"
    );

    if let Some(conns) = connections {
        info!(
            target: "zkv::stats",
            active = conns.active_connections.load(Ordering::Relaxed),
            accepted = conns.connections_accepted.load(Ordering::Relaxed),
            processed_messages = conns.messages_processed.load(Ordering::Relaxed),
            dropped_messages = conns.messages_dropped.load(Ordering::Relaxed),
            bytes_read = conns.bytes_read.load(Ordering::Relaxed),
            bytes_written = conns.bytes_written.load(Ordering::Relaxed),
            "Connections"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reporter_resets_window() {
        let stats = Arc::new(StatsTracker::new());
        stats.record_read("a");
        stats.record_write("a");

        let reporter = StatsReporter::start(
            Arc::clone(&stats),
            None,
            ReporterConfig {
                interval: Duration::from_millis(20),
            },
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        reporter.stop().await;

        let totals = stats.totals();
        assert_eq!(totals.window_reads, 0);
        assert_eq!(totals.window_writes, 0);
        assert_eq!(totals.total_reads, 1);
        assert_eq!(totals.total_writes, 1);
    }

    #[tokio::test]
    async fn test_no_reset_after_stop() {
        let stats = Arc::new(StatsTracker::new());
        let reporter = StatsReporter::start(
            Arc::clone(&stats),
            Some(Arc::new(ConnectionStats::new())),
            ReporterConfig {
                interval: Duration::from_millis(10),
            },
        );
        reporter.stop().await;

        stats.record_read("a");
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(stats.totals().window_reads, 1);
    }

    #[tokio::test]
    async fn test_stop_is_prompt() {
        let reporter = StatsReporter::start(
            Arc::new(StatsTracker::new()),
            None,
            ReporterConfig {
                interval: Duration::from_secs(3600),
            },
        );

        tokio::time::timeout(Duration::from_secs(1), reporter.stop())
            .await
            .expect("stop should not wait for the interval");
    }

    #[test]
    fn test_report_takes_window() {
        let stats = StatsTracker::new();
        stats.record_read("x");
        stats.record_read("x");

        report(&stats, None, Duration::from_secs(5));

        assert_eq!(stats.take_window(), (0, 0));
        assert_eq!(stats.totals().total_reads, 2);
    }

    /// Collects formatted log output in memory.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_report_includes_connection_stats() {
        let stats = StatsTracker::new();
        let conns = ConnectionStats::new();
        conns.connection_opened();
        conns.message_processed();
        conns.message_processed();
        conns.message_dropped();
        conns.bytes_read(123);
        conns.bytes_written(456);

        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            report(&stats, Some(&conns), Duration::from_secs(5));
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Connections"));
        assert!(output.contains("active=1"));
        assert!(output.contains("accepted=1"));
        assert!(output.contains("processed_messages=2"));
        assert!(output.contains("dropped_messages=1"));
        assert!(output.contains("bytes_read=123"));
        assert!(output.contains("bytes_written=456"));
    }
}
