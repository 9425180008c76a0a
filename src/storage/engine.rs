//! Thread-Safe Key-Value Store
//!
//! This module implements the shared state of the server: a single map from
//! keys to values that every client connection reads and writes.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//! │ connection 1 │  │ connection 2 │  │ connection N │
//! └──────┬───────┘  └──────┬───────┘  └──────┬───────┘
//!        │ get/set         │ get/set         │ get/set
//!        ▼                 ▼                 ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                       Store                         │
//! │        RwLock<HashMap<Bytes, Bytes>>                │
//! │   many concurrent GETs  |  one SET at a time        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! A `set` holds the write lock for a single `HashMap::insert`, so the
//! exclusive window is short and bounded. Values are `Bytes`, which are
//! cloned out of the map by bumping a reference count: a reader either
//! sees a value that was fully inserted or no value at all.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// The key-value store shared by all connections.
///
/// # Thread Safety
///
/// This struct is designed to be wrapped in an `Arc` and shared across
/// all client handler tasks. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use minikv::storage::Store;
/// use bytes::Bytes;
///
/// let store = Store::new();
///
/// store.set(Bytes::from("name"), Bytes::from("Ariz"));
///
/// assert_eq!(store.get(b"name"), Some(Bytes::from("Ariz")));
/// assert_eq!(store.get(b"missing"), None);
/// ```
pub struct Store {
    /// The map itself; only reachable through the accessors below
    data: RwLock<HashMap<Bytes, Bytes>>,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: GETs that found a value
    hit_count: AtomicU64,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("keys", &self.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
        }
    }

    /// Sets a key-value pair.
    ///
    /// If the key already exists, its value is overwritten.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was updated.
    pub fn set(&self, key: Bytes, value: Bytes) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.data.write();
        data.insert(key, value).is_none()
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key has never been set.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let value = self.data.read().get(key).cloned();
        if value.is_some() {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Returns the number of keys in the store.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if no key has been set.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StoreStats {
        let get_ops = self.get_count.load(Ordering::Relaxed);
        let hits = self.hit_count.load(Ordering::Relaxed);

        StoreStats {
            keys: self.len() as u64,
            get_ops,
            set_ops: self.set_count.load(Ordering::Relaxed),
            hits,
            misses: get_ops.saturating_sub(hits),
        }
    }
}

/// A point-in-time snapshot of store counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub hits: u64,
    pub misses: u64,
}
