//! Persistent Key-Value Store
//!
//! This module implements the string-to-string map shared by every
//! connection, together with its on-disk copy.
//!
//! ## Design Decisions
//!
//! 1. **One RwLock for the whole map**: reads and persists share it, `set` takes it exclusively.
//! 2. **Deferred persistence**: `set` only marks the store dirty; a background
//!    [`FlushTask`](crate::storage::FlushTask) writes the file at most once per interval.
//! 3. **Independent dirty flag**: an `AtomicBool` outside the lock, so the flush
//!    loop can test-and-clear it without contending with readers.
//! 4. **Whole-file rewrites**: the map is written as a JSON object to a sibling
//!    temporary file and renamed over the old one.
//!
//! ## Concurrency Model
//!
//! ```text
//!   get ──┐                        ┌── set (exclusive)
//!   get ──┼──> RwLock<HashMap> <───┘
//! persist ┘     (shared)
//!
//!   set ──> dirty.store(true)      flush loop ──> dirty.swap(false) ──> persist
//! ```
//!
//! No lock is ever held across an `.await`; every method here is synchronous.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that can occur while writing the store to disk.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file could not be written or renamed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The map could not be encoded
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The key-value store.
///
/// Absent keys read as the empty string; there is no separate "not found"
/// answer.
///
/// # Thread Safety
///
/// Wrap it in an `Arc` and share it across connection tasks. All methods
/// take `&self`.
///
/// # Example
///
/// ```no_run
/// use zkv::storage::KeyValueStore;
///
/// let store = KeyValueStore::open("config.txt");
///
/// store.set("color", "blue");
/// assert_eq!(store.get("color"), "blue");
/// assert_eq!(store.get("missing"), "");
/// assert!(store.is_dirty());
///
/// store.flush_if_dirty().unwrap();
/// assert!(!store.is_dirty());
/// ```
#[derive(Debug)]
pub struct KeyValueStore {
    /// Backing file
    path: PathBuf,

    /// The mapping itself
    data: RwLock<HashMap<String, String>>,

    /// True iff the map changed since the last successful persist
    dirty: AtomicBool,

    /// Serializes file writes so snapshots land on disk in order
    write_lock: Mutex<()>,
}

impl KeyValueStore {
    /// Creates an empty store bound to `path` without touching the disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: RwLock::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a store bound to `path` and loads it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self::new(path);
        store.load();
        store
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the map from the backing file.
    ///
    /// - Missing file: starts empty and writes an empty store right away.
    /// - Unreadable or unparsable file: logs and starts empty. The old
    ///   content is overwritten by the next persist.
    ///
    /// Never fails; problems are logged.
    pub fn load(&self) {
        let loaded = match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, String>>(&bytes) {
                Ok(map) => {
                    info!(path = %self.path.display(), keys = map.len(), "Store loaded");
                    map
                }
                Err(e) => {
                    error!(
                        path = %self.path.display(),
                        error = %e,
                        "Failed to parse store, starting empty"
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "Store file not found, creating it");
                self.replace(HashMap::new());
                if let Err(e) = self.persist() {
                    error!(path = %self.path.display(), error = %e, "Failed to create store file");
                }
                return;
            }
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read store, starting empty"
                );
                HashMap::new()
            }
        };

        self.replace(loaded);
    }

    /// Returns the value for `key`, or `""` when it is absent.
    pub fn get(&self, key: &str) -> String {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.get(key).cloned().unwrap_or_default()
    }

    /// Inserts or overwrites `key` and marks the store dirty.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        {
            let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
            data.insert(key.into(), value.into());
        }
        self.dirty.store(true, Ordering::Release);
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if there are changes not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Atomically reads and clears the dirty flag.
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Writes the whole map to the backing file.
    ///
    /// The snapshot is taken under the shared lock, so no `set` can land
    /// halfway through it. The file is written to `<path>.tmp` and renamed
    /// into place. Does not touch the dirty flag.
    pub fn persist(&self) -> Result<(), StoreError> {
        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let (encoded, keys) = {
            let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
            (encode(&data)?, data.len())
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = tmp_path(&self.path);
        let mut file = File::create(&tmp)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), keys, bytes = encoded.len(), "Store persisted");
        Ok(())
    }

    /// Persists if the store is dirty.
    ///
    /// The flag is cleared before writing; if the write fails it is set
    /// again so the next attempt retries. Returns whether a write happened.
    pub fn flush_if_dirty(&self) -> Result<bool, StoreError> {
        if !self.take_dirty() {
            return Ok(false);
        }

        match self.persist() {
            Ok(()) => Ok(true),
            Err(e) => {
                self.dirty.store(true, Ordering::Release);
                Err(e)
            }
        }
    }

    fn replace(&self, map: HashMap<String, String>) {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *data = map;
    }
}

/// Encodes the map as a pretty-printed JSON object with sorted keys.
fn encode(data: &HashMap<String, String>) -> Result<Vec<u8>, serde_json::Error> {
    let sorted: BTreeMap<&str, &str> = data.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let mut out = Vec::with_capacity(data.len() * 32 + 2);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    sorted.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
