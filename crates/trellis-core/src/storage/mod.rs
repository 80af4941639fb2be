//! # Storage Module
//!
//! The key-value substrate contract the overlay is built on, plus two backends:
//! - `MemoryStore`: in-process, every primitive serialized behind one mutex
//! - `RedbStore`: redb embedded database, every primitive in its own write transaction
//!
//! The substrate provides linearizable single-key operations and nothing
//! more. There are no multi-key transactions, and the overlay never assumes any.

pub mod codec;
mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::GraphError;
use std::collections::BTreeSet;
use std::fmt;

/// Raw key/value pair returned by prefix scans.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Raw key/set pair returned by set prefix scans.
pub type KvSet = (Vec<u8>, BTreeSet<u64>);

// =============================================================================
// KVSTORE TRAIT
// =============================================================================

/// The key-value substrate contract.
///
/// Keyspaces are plain names. Map keyspaces (`get`/`put`/...) and set
/// keyspaces (`set_*`) are disjoint; the overlay never uses one name for both.
///
/// Every method is atomic with respect to the single key it touches.
/// Prefix scans are not snapshots across keys.
pub trait KvStore: Send + Sync {
    /// Read a value.
    fn get(&self, space: &str, key: &[u8]) -> Result<Option<Vec<u8>>, GraphError>;

    /// Unconditional upsert.
    fn put(&self, space: &str, key: &[u8], value: &[u8]) -> Result<(), GraphError>;

    /// Insert only if the key is absent. Returns true iff inserted.
    fn put_if_absent(&self, space: &str, key: &[u8], value: &[u8]) -> Result<bool, GraphError>;

    /// Remove a key. Returns true iff it was present.
    fn remove(&self, space: &str, key: &[u8]) -> Result<bool, GraphError>;

    /// Check whether a key is present.
    fn contains_key(&self, space: &str, key: &[u8]) -> Result<bool, GraphError>;

    /// All pairs whose key starts with `prefix`, in key order.
    fn scan(&self, space: &str, prefix: &[u8]) -> Result<Vec<KvPair>, GraphError>;

    /// Atomically increment a named counter and return the new value.
    /// The first call on a fresh counter returns 1.
    fn increment(&self, counter: &str) -> Result<u64, GraphError>;

    /// Add `member` to the set under `key`. Returns true iff it was newly added.
    fn set_insert(&self, space: &str, key: &[u8], member: u64) -> Result<bool, GraphError>;

    /// Remove `member` from the set under `key`. Returns true iff it was present.
    /// A set that becomes empty is pruned.
    fn set_remove(&self, space: &str, key: &[u8], member: u64) -> Result<bool, GraphError>;

    /// Members of the set under `key` (empty if absent).
    fn set_members(&self, space: &str, key: &[u8]) -> Result<BTreeSet<u64>, GraphError>;

    /// All sets whose key starts with `prefix`, in key order.
    fn scan_sets(&self, space: &str, prefix: &[u8]) -> Result<Vec<KvSet>, GraphError>;

    /// Remove every set whose key starts with `prefix`. Returns how many were removed.
    fn remove_sets(&self, space: &str, prefix: &[u8]) -> Result<usize, GraphError>;
}

/// Map any backend error into `GraphError::StorageUnavailable`.
pub(crate) fn storage_err(e: impl fmt::Display) -> GraphError {
    GraphError::StorageUnavailable(e.to_string())
}
