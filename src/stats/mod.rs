//! Statistics Module
//!
//! Per-key read/write counters that are returned with every reply, plus
//! process-wide totals logged periodically by a background reporter.
//!
//! ```text
//!   CommandHandler ──record_read/record_write──> StatsTracker
//!                                                    ▲
//!                                   totals/take_window│ every 5s
//!                                              StatsReporter
//! ```

pub mod reporter;
pub mod tracker;

pub use reporter::{ReporterConfig, StatsReporter};
pub use tracker::{KeyStat, StatsTracker, Totals};
