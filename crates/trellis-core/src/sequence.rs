//! # Identity Sequence
//!
//! Relation id allocation backed by the substrate's atomic counter.
//!
//! The sequence holds no local state; every call goes to the substrate, so
//! ids stay unique across threads and across processes sharing one store.

use crate::storage::KvStore;
use crate::{GraphError, RelationId};
use std::sync::Arc;

/// Handle to a named substrate counter that issues relation ids.
#[derive(Debug)]
pub struct IdentitySequence<S> {
    store: Arc<S>,
    counter: String,
}

impl<S> Clone for IdentitySequence<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            counter: self.counter.clone(),
        }
    }
}

impl<S: KvStore> IdentitySequence<S> {
    /// Create a sequence over the named counter.
    pub fn new(store: Arc<S>, counter: impl Into<String>) -> Self {
        Self {
            store,
            counter: counter.into(),
        }
    }

    /// Name of the backing counter.
    #[must_use]
    pub fn counter(&self) -> &str {
        &self.counter
    }

    /// Issue the next id.
    ///
    /// Strictly greater than every id issued before. An id is consumed even if
    /// the caller later fails, so ids are not dense.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Result<RelationId, GraphError> {
        self.store.increment(&self.counter).map(RelationId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn ids_strictly_increase() {
        let seq = IdentitySequence::new(Arc::new(MemoryStore::new()), "ids");
        let a = seq.next().expect("next");
        let b = seq.next().expect("next");
        let c = seq.next().expect("next");
        assert!(a < b && b < c);
        assert_eq!(a, RelationId(1));
    }

    #[test]
    fn clones_share_the_counter() {
        let seq = IdentitySequence::new(Arc::new(MemoryStore::new()), "ids");
        let other = seq.clone();
        let a = seq.next().expect("next");
        let b = other.next().expect("next");
        assert!(b > a);
    }

    #[test]
    fn concurrent_callers_get_distinct_ids() {
        let seq = IdentitySequence::new(Arc::new(MemoryStore::new()), "ids");
        let mut all: Vec<RelationId> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let seq = seq.clone();
                    scope.spawn(move || {
                        (0..100)
                            .map(|_| seq.next().expect("next"))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().expect("join"))
                .collect()
        });
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 400);
    }
}
