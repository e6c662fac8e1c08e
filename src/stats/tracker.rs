//! Access Statistics
//!
//! Tracks how often each key is read and written, plus process-wide
//! totals and a windowed count that the reporter resets every interval.
//!
//! ## Concurrency
//!
//! - The per-key table sits behind one `Mutex`, held only for a single
//!   increment or lookup.
//! - Totals and window counters are plain atomics and never take the lock.
//!
//! Counts are exact per key. There is no consistent snapshot across keys,
//! and a report may catch the window counters mid-update.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Read and write counters for a single key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyStat {
    /// Number of `get`s of this key
    pub reads: u64,
    /// Number of `set`s of this key
    pub writes: u64,
}

/// Process-wide counters at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Reads since startup
    pub total_reads: u64,
    /// Writes since startup
    pub total_writes: u64,
    /// Reads since the last window reset
    pub window_reads: u64,
    /// Writes since the last window reset
    pub window_writes: u64,
}

/// Thread-safe access counters.
///
/// # Example
///
/// ```
/// use zkv::stats::{KeyStat, StatsTracker};
///
/// let stats = StatsTracker::new();
/// stats.record_read("apple");
/// stats.record_read("apple");
/// let after = stats.record_write("apple");
///
/// assert_eq!(after, KeyStat { reads: 2, writes: 1 });
/// assert_eq!(stats.get_counts("banana"), KeyStat::default());
/// ```
#[derive(Debug, Default)]
pub struct StatsTracker {
    /// Per-key counters, created on first access
    keys: Mutex<HashMap<String, KeyStat>>,

    total_reads: AtomicU64,
    total_writes: AtomicU64,
    window_reads: AtomicU64,
    window_writes: AtomicU64,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one read of `key` and returns the key's counters after it.
    pub fn record_read(&self, key: &str) -> KeyStat {
        self.total_reads.fetch_add(1, Ordering::Relaxed);
        self.window_reads.fetch_add(1, Ordering::Relaxed);
        self.update(key, |stat| stat.reads += 1)
    }

    /// Counts one write of `key` and returns the key's counters after it.
    pub fn record_write(&self, key: &str) -> KeyStat {
        self.total_writes.fetch_add(1, Ordering::Relaxed);
        self.window_writes.fetch_add(1, Ordering::Relaxed);
        self.update(key, |stat| stat.writes += 1)
    }

    /// Returns the counters for `key`; zero for keys never accessed.
    pub fn get_counts(&self, key: &str) -> KeyStat {
        let keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        keys.get(key).copied().unwrap_or_default()
    }

    /// Returns the process-wide counters.
    pub fn totals(&self) -> Totals {
        Totals {
            total_reads: self.total_reads.load(Ordering::Relaxed),
            total_writes: self.total_writes.load(Ordering::Relaxed),
            window_reads: self.window_reads.load(Ordering::Relaxed),
            window_writes: self.window_writes.load(Ordering::Relaxed),
        }
    }

    /// Returns the window counters as `(reads, writes)` and resets them to zero.
    pub fn take_window(&self) -> (u64, u64) {
        (
            self.window_reads.swap(0, Ordering::Relaxed),
            self.window_writes.swap(0, Ordering::Relaxed),
        )
    }

    /// Returns how many distinct keys have been accessed.
    pub fn tracked_keys(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn update(&self, key: &str, f: impl FnOnce(&mut KeyStat)) -> KeyStat {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stat) = keys.get_mut(key) {
            f(stat);
            return *stat;
        }
        let stat = keys.entry(key.to_owned()).or_default();
        f(stat);
        *stat
    }
}
