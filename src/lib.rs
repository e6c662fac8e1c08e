//! # zkv - A Concurrent Key-Value Server with a Compressed Text Protocol
//!
//! zkv is a small network key-value store. Clients send zlib-compressed
//! text commands (`$get`, `$set`) over TCP and get compressed text replies
//! carrying the value and per-key read/write counters.
//!
//! ## Features
//!
//! - **Async I/O**: Built on Tokio; one task per connection on a worker pool
//! - **Shared store**: One `RwLock`-guarded map, persisted in the background
//! - **Deferred persistence**: Writes are coalesced and flushed every few seconds
//! - **Access statistics**: Exact per-key counters and periodic throughput reports
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                 zkv                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Server    │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Acceptor)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │                            │                  │                         │
//! │                     ┌──────┴──────┐    ┌──────┴───────────────────┐     │
//! │                     │   Codec     │    ▼                          ▼     │
//! │                     │   (zlib)    │  KeyValueStore          StatsTracker│
//! │                     └─────────────┘    ▲                          ▲     │
//! │                                        │                          │     │
//! │                               ┌────────┴───────┐       ┌──────────┴───┐ │
//! │                               │   FlushTask    │       │ StatsReporter│ │
//! │                               │ (every 5s)     │       │ (every 5s)   │ │
//! │                               └────────────────┘       └──────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use zkv::config::Config;
//! use zkv::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::bind(&Config::default()).await?;
//!     server.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol
//!
//! - `$get key` → `key=value\nreads=N\nwrites=M\n`
//! - `$set key=value` → `Set key=value\nreads=N\nwrites=M\n`
//! - malformed `$set` → `Invalid $set format\n`
//! - anything else → `Unknown command\n`
//!
//! ## Module Overview
//!
//! - [`protocol`]: zlib codec, command parser, reply types
//! - [`storage`]: the key-value store and its background flush task
//! - [`stats`]: per-key counters and the background reporter
//! - [`commands`]: executes commands against store and stats
//! - [`connection`]: per-client read/process/reply loop
//! - [`server`]: listener, accept loop, and shutdown
//! - [`client`]: async client for the protocol
//! - [`config`]: CLI and TOML configuration

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod stats;
pub mod storage;

// Re-export commonly used types for convenience
pub use client::{Client, ClientError};
pub use commands::CommandHandler;
pub use config::{Config, ConfigError};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{CodecError, Command, Reply};
pub use server::Server;
pub use stats::{KeyStat, StatsReporter, StatsTracker};
pub use storage::{FlushTask, KeyValueStore, StoreError};

/// The default port zkv listens on
pub const DEFAULT_PORT: u16 = 8888;

/// The default host zkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// The default file the store is persisted to
pub const DEFAULT_STORE_FILE: &str = "config.txt";

/// Version of zkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
