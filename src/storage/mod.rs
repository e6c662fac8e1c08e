//! Storage Module
//!
//! This module provides the key-value store shared by all connections and
//! the background task that writes it to disk.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     KeyValueStore                           │
//! │   RwLock<HashMap<String, String>>        AtomicBool dirty   │
//! └──────────────────────────────┬──────────────────────────────┘
//!                            ▲   │ persist()
//!                            │   ▼
//!              ┌─────────────┴───────────┐      ┌────────────┐
//!              │       FlushTask         │      │ store file │
//!              │  (Background Tokio Task)│      │   (JSON)   │
//!              └─────────────────────────┘      └────────────┘
//! ```
//!
//! ## Features
//!
//! - **RwLock**: Multiple concurrent readers, exclusive writers
//! - **Deferred writes**: `set` marks the store dirty, the flush task persists it
//! - **Crash-safe file replacement**: write to a temporary file, then rename
//! - **Forgiving load**: a missing file is created, a corrupt one is ignored
//!
//! ## Example
//!
//! ```
//! use zkv::storage::KeyValueStore;
//!
//! let store = KeyValueStore::new("config.txt");
//!
//! store.set("name", "zkv");
//! assert_eq!(store.get("name"), "zkv");
//! assert_eq!(store.get("nope"), "");
//! ```

pub mod flush;
pub mod store;

// Re-export commonly used types
pub use flush::{FlushConfig, FlushTask};
pub use store::{KeyValueStore, StoreError};
