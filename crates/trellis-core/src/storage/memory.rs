//! # In-Memory Substrate
//!
//! A `KvStore` held entirely in process memory. Every primitive takes the
//! same mutex, which makes each one linearizable.

use super::{KvPair, KvSet, KvStore};
use crate::GraphError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    maps: BTreeMap<String, BTreeMap<Vec<u8>, Vec<u8>>>,
    sets: BTreeMap<String, BTreeMap<Vec<u8>, BTreeSet<u64>>>,
    counters: BTreeMap<String, u64>,
}

/// In-memory key-value substrate.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, GraphError> {
        self.state
            .lock()
            .map_err(|_| GraphError::StorageUnavailable("memory store lock poisoned".to_string()))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, space: &str, key: &[u8]) -> Result<Option<Vec<u8>>, GraphError> {
        let state = self.lock()?;
        Ok(state
            .maps
            .get(space)
            .and_then(|map| map.get(key))
            .cloned())
    }

    fn put(&self, space: &str, key: &[u8], value: &[u8]) -> Result<(), GraphError> {
        let mut state = self.lock()?;
        state
            .maps
            .entry(space.to_string())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn put_if_absent(&self, space: &str, key: &[u8], value: &[u8]) -> Result<bool, GraphError> {
        let mut state = self.lock()?;
        let map = state.maps.entry(space.to_string()).or_default();
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(key.to_vec(), value.to_vec());
        Ok(true)
    }

    fn remove(&self, space: &str, key: &[u8]) -> Result<bool, GraphError> {
        let mut state = self.lock()?;
        Ok(state
            .maps
            .get_mut(space)
            .is_some_and(|map| map.remove(key).is_some()))
    }

    fn contains_key(&self, space: &str, key: &[u8]) -> Result<bool, GraphError> {
        let state = self.lock()?;
        Ok(state
            .maps
            .get(space)
            .is_some_and(|map| map.contains_key(key)))
    }

    fn scan(&self, space: &str, prefix: &[u8]) -> Result<Vec<KvPair>, GraphError> {
        let state = self.lock()?;
        let Some(map) = state.maps.get(space) else {
            return Ok(Vec::new());
        };
        Ok(map
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn increment(&self, counter: &str) -> Result<u64, GraphError> {
        let mut state = self.lock()?;
        let current = state.counters.entry(counter.to_string()).or_insert(0);
        *current = current.checked_add(1).ok_or_else(|| {
            GraphError::StorageUnavailable(format!("counter {counter} exhausted"))
        })?;
        Ok(*current)
    }

    fn set_insert(&self, space: &str, key: &[u8], member: u64) -> Result<bool, GraphError> {
        let mut state = self.lock()?;
        Ok(state
            .sets
            .entry(space.to_string())
            .or_default()
            .entry(key.to_vec())
            .or_default()
            .insert(member))
    }

    fn set_remove(&self, space: &str, key: &[u8], member: u64) -> Result<bool, GraphError> {
        let mut state = self.lock()?;
        let Some(sets) = state.sets.get_mut(space) else {
            return Ok(false);
        };
        let Some(members) = sets.get_mut(key) else {
            return Ok(false);
        };
        let removed = members.remove(&member);
        if members.is_empty() {
            sets.remove(key);
        }
        Ok(removed)
    }

    fn set_members(&self, space: &str, key: &[u8]) -> Result<BTreeSet<u64>, GraphError> {
        let state = self.lock()?;
        Ok(state
            .sets
            .get(space)
            .and_then(|sets| sets.get(key))
            .cloned()
            .unwrap_or_default())
    }

    fn scan_sets(&self, space: &str, prefix: &[u8]) -> Result<Vec<KvSet>, GraphError> {
        let state = self.lock()?;
        let Some(sets) = state.sets.get(space) else {
            return Ok(Vec::new());
        };
        Ok(sets
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, members)| (key.clone(), members.clone()))
            .collect())
    }

    fn remove_sets(&self, space: &str, prefix: &[u8]) -> Result<usize, GraphError> {
        let mut state = self.lock()?;
        let Some(sets) = state.sets.get_mut(space) else {
            return Ok(0);
        };
        let doomed: Vec<Vec<u8>> = sets
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            sets.remove(key);
        }
        Ok(doomed.len())
    }
}
