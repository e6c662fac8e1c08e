//! Reply Types
//!
//! Every reply is plain text terminated by a newline. Successful commands
//! carry the per-key access counters after the command took effect.
//!
//! ## Formats
//!
//! ```text
//! get:             <key>=<value>\nreads=<N>\nwrites=<M>\n
//! set:             Set <key>=<value>\nreads=<N>\nwrites=<M>\n
//! malformed set:   Invalid $set format\n
//! unknown verb:    Unknown command\n
//! codec failure:   Compression failed\n   (sent uncompressed)
//! ```

use std::fmt;

/// Fallback reply sent verbatim when a reply could not be compressed.
pub const COMPRESSION_FAILED: &str = "Compression failed\n";

/// A reply to a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Result of `$get`
    Value {
        key: String,
        value: String,
        reads: u64,
        writes: u64,
    },

    /// Result of `$set`
    Stored {
        key: String,
        value: String,
        reads: u64,
        writes: u64,
    },

    /// `$set` without `=` or without a key
    InvalidSet,

    /// Unrecognized verb
    UnknownCommand,
}

impl Reply {
    /// Renders the reply as wire text (before compression).
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Value {
                key,
                value,
                reads,
                writes,
            } => write!(f, "{}={}\nreads={}\nwrites={}\n", key, value, reads, writes),
            Reply::Stored {
                key,
                value,
                reads,
                writes,
            } => write!(
                f,
                "Set {}={}\nreads={}\nwrites={}\n",
                key, value, reads, writes
            ),
            Reply::InvalidSet => f.write_str("Invalid $set format\n"),
            Reply::UnknownCommand => f.write_str("Unknown command\n"),
        }
    }
}
