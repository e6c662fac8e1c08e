//! Command Parser
//!
//! Requests are single lines of text once decompressed. There is no
//! framing beyond the transport chunk, so a command is whatever one
//! decompressed message contains.
//!
//! ## Grammar
//!
//! ```text
//! $get <key>          key = everything after "$get "
//! $set <key>=<value>  key = text between "$set " and the first '=',
//!                     value = everything after that '='
//! ```
//!
//! Nothing is trimmed: trailing whitespace or newlines are part of the key
//! or value. A `$set` with no `=` or with an empty key is reported as
//! [`Command::InvalidSet`] so the caller can answer without touching the
//! store.

/// Verb prefix for reads, including the separating space.
pub const GET_PREFIX: &str = "$get ";

/// Verb prefix for writes, including the separating space.
pub const SET_PREFIX: &str = "$set ";

/// A parsed request, borrowing from the decompressed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// `$get <key>`
    Get { key: &'a str },

    /// `$set <key>=<value>`
    Set { key: &'a str, value: &'a str },

    /// `$set` without `=` or with an empty key
    InvalidSet,

    /// Any other leading token
    Unknown,
}

impl Command<'_> {
    /// Returns the verb name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "get",
            Command::Set { .. } | Command::InvalidSet => "set",
            Command::Unknown => "unknown",
        }
    }
}

/// Parses one decompressed message into a [`Command`].
///
/// # Example
///
/// ```
/// use zkv::protocol::{parse_command, Command};
///
/// assert_eq!(parse_command("$get color"), Command::Get { key: "color" });
/// assert_eq!(
///     parse_command("$set color=blue"),
///     Command::Set { key: "color", value: "blue" }
/// );
/// assert_eq!(parse_command("$set nokeyequalssign"), Command::InvalidSet);
/// assert_eq!(parse_command("$del color"), Command::Unknown);
/// ```
pub fn parse_command(line: &str) -> Command<'_> {
    if let Some(key) = line.strip_prefix(GET_PREFIX) {
        return Command::Get { key };
    }

    if let Some(rest) = line.strip_prefix(SET_PREFIX) {
        return match rest.split_once('=') {
            Some((key, value)) if !key.is_empty() => Command::Set { key, value },
            _ => Command::InvalidSet,
        };
    }

    Command::Unknown
}
