//! Command Handler
//!
//! Executes parsed requests against the shared store and statistics and
//! builds the reply.
//!
//! ## Supported Commands
//!
//! - `$get key` - Read a key (absent keys read as empty) and count a read
//! - `$set key=value` - Write a key and count a write
//!
//! Anything else is answered with a fixed error reply; a malformed `$set`
//! touches neither the store nor the counters.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │   parse()   │───>│  dispatch() │───>│   Reply     │     │
//! │  └─────────────┘    └──────┬──────┘    └─────────────┘     │
//! │                            │                                │
//! │               ┌────────────┴────────────┐                   │
//! │               ▼                         ▼                   │
//! │        KeyValueStore               StatsTracker             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::protocol::{parse_command, Command, Reply};
use crate::stats::StatsTracker;
use crate::storage::KeyValueStore;
use std::sync::Arc;
use tracing::trace;

/// Dispatches requests to the store and the statistics tracker.
///
/// Cheap to clone; every connection gets its own copy.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    /// The key-value store
    store: Arc<KeyValueStore>,
    /// Per-key access counters
    stats: Arc<StatsTracker>,
}

impl CommandHandler {
    /// Creates a new command handler over the shared store and stats.
    pub fn new(store: Arc<KeyValueStore>, stats: Arc<StatsTracker>) -> Self {
        Self { store, stats }
    }

    /// Executes one decompressed request line and returns the reply.
    pub fn execute(&self, line: &str) -> Reply {
        let command = parse_command(line);
        trace!(command = command.name(), "Executing command");
        self.dispatch(command)
    }

    /// Dispatches a parsed command to its handler.
    pub fn dispatch(&self, command: Command<'_>) -> Reply {
        match command {
            Command::Get { key } => self.cmd_get(key),
            Command::Set { key, value } => self.cmd_set(key, value),
            Command::InvalidSet => Reply::InvalidSet,
            Command::Unknown => Reply::UnknownCommand,
        }
    }

    fn cmd_get(&self, key: &str) -> Reply {
        let value = self.store.get(key);
        let counts = self.stats.record_read(key);

        Reply::Value {
            key: key.to_owned(),
            value,
            reads: counts.reads,
            writes: counts.writes,
        }
    }

    fn cmd_set(&self, key: &str, value: &str) -> Reply {
        self.store.set(key, value);
        let counts = self.stats.record_write(key);

        Reply::Stored {
            key: key.to_owned(),
            value: value.to_owned(),
            reads: counts.reads,
            writes: counts.writes,
        }
    }
}
