//! Command Handler Module
//!
//! This module implements the command processing layer for zkv.
//! It receives decompressed request lines, executes them against the
//! store and the statistics tracker, and returns replies.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Command parser  │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────┐
//! │ KeyValueStore  +  StatsTracker  │
//! └─────────────────────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `$get <key>`
//! - `$set <key>=<value>`

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
