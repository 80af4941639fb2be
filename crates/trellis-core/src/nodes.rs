//! # Node Store
//!
//! Key -> payload table. Knows nothing about relations; cascading cleanup on
//! delete is the graph service's job.

use crate::storage::KvStore;
use crate::storage::codec::{decode, encode};
use crate::{GraphError, GraphKey, Payload};
use std::marker::PhantomData;
use std::sync::Arc;

/// Node table over a substrate keyspace.
///
/// Keys are postcard-encoded; payload bytes are stored as-is.
#[derive(Debug)]
pub struct NodeStore<S, K> {
    store: Arc<S>,
    space: String,
    _key: PhantomData<fn() -> K>,
}

impl<S, K> Clone for NodeStore<S, K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            space: self.space.clone(),
            _key: PhantomData,
        }
    }
}

impl<S: KvStore, K: GraphKey> NodeStore<S, K> {
    /// Create a node store over the given keyspace.
    pub fn new(store: Arc<S>, space: impl Into<String>) -> Self {
        Self {
            store,
            space: space.into(),
            _key: PhantomData,
        }
    }

    /// Insert only if `key` is absent. Returns false, without writing, if it exists.
    pub fn create(&self, key: &K, value: &Payload) -> Result<bool, GraphError> {
        self.store
            .put_if_absent(&self.space, &encode(key)?, value.as_bytes())
    }

    /// Overwrite the payload of an existing node. Returns false if absent.
    ///
    /// Check-then-put: a concurrent delete between the two steps can
    /// resurrect the node.
    pub fn replace(&self, key: &K, value: &Payload) -> Result<bool, GraphError> {
        let encoded = encode(key)?;
        if !self.store.contains_key(&self.space, &encoded)? {
            return Ok(false);
        }
        self.store.put(&self.space, &encoded, value.as_bytes())?;
        Ok(true)
    }

    /// Read a node payload.
    pub fn get(&self, key: &K) -> Result<Option<Payload>, GraphError> {
        Ok(self.store.get(&self.space, &encode(key)?)?.map(Payload))
    }

    /// Check whether a node exists.
    pub fn contains(&self, key: &K) -> Result<bool, GraphError> {
        self.store.contains_key(&self.space, &encode(key)?)
    }

    /// Delete a node. Returns whether a node was actually removed.
    pub fn delete(&self, key: &K) -> Result<bool, GraphError> {
        self.store.remove(&self.space, &encode(key)?)
    }

    /// All node keys, in encoded-key order.
    pub fn keys(&self) -> Result<Vec<K>, GraphError> {
        self.store
            .scan(&self.space, &[])?
            .iter()
            .map(|(key, _)| decode(key))
            .collect()
    }
}
