//! Connection Handler Module
//!
//! This module manages individual client connections to zkv.
//! Each client connection is handled by its own async task, allowing
//! the server to handle thousands of concurrent clients efficiently.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (server.rs)                              │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌──────────┐   ┌────────────┐   ┌─────────┐   ┌────────┐   │
//! │  │Read chunk│──>│ Decompress │──>│ Execute │──>│Compress│   │
//! │  └──────────┘   └────────────┘   └─────────┘   └───┬────┘   │
//! │                                                    ▼        │
//! │                                              ┌──────────┐   │
//! │                                              │Send reply│   │
//! │                                              └──────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Async I/O**: Uses Tokio for non-blocking network operations
//! - **In-order replies**: one request is answered before the next is read
//! - **Local recovery**: bad payloads are dropped, the connection stays up
//! - **Statistics**: Tracks connection and message metrics
//!
//! ## Example
//!
//! ```ignore
//! use zkv::connection::{handle_connection, ConnectionStats};
//! use zkv::commands::CommandHandler;
//! use std::sync::Arc;
//!
//! let stats = Arc::new(ConnectionStats::new());
//! let handler = CommandHandler::new(store, tracker);
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, handler, stats));
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionStats, READ_CHUNK_SIZE,
};
