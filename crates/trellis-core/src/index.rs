//! # Relation Indexes
//!
//! Derived `primary -> secondary -> {relation ids}` structures kept next to
//! the relation table:
//! - `AdjacencyIndex`: node -> neighbor -> ids ("who is X connected to")
//! - `TypeIndex`: node -> relation type -> ids ("which T relations touch X")
//!
//! Both are the same `RelationIndex` over a different secondary key. Each
//! `(primary, secondary)` pair is one substrate set under a composite key.
//! Membership changes go through the substrate's atomic set primitives and
//! never through get-modify-put, so concurrent writers cannot drop each
//! other's ids.
//!
//! Entries are never authoritative. Everything here can be rebuilt from the
//! relation store (see `consistency`).

use crate::storage::KvStore;
use crate::storage::codec::{composite_key, encode, split_composite};
use crate::{GraphError, GraphKey, RelationId};
use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::sync::Arc;

/// Index from node key to neighbor key to relation ids.
pub type AdjacencyIndex<S, K> = RelationIndex<S, K, K>;

/// Index from node key to relation type to relation ids.
pub type TypeIndex<S, K> = RelationIndex<S, K, String>;

/// One `(primary, secondary, ids)` row of an index.
pub type IndexEntry<K, T> = (K, T, BTreeSet<RelationId>);

/// A set-valued index keyed by `(primary, secondary)`.
#[derive(Debug)]
pub struct RelationIndex<S, K, T> {
    store: Arc<S>,
    space: String,
    _keys: PhantomData<fn() -> (K, T)>,
}

impl<S, K, T> Clone for RelationIndex<S, K, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            space: self.space.clone(),
            _keys: PhantomData,
        }
    }
}

fn to_ids(members: BTreeSet<u64>) -> BTreeSet<RelationId> {
    members.into_iter().map(RelationId).collect()
}

impl<S: KvStore, K: GraphKey, T: GraphKey> RelationIndex<S, K, T> {
    /// Create an index over the given keyspace.
    pub fn new(store: Arc<S>, space: impl Into<String>) -> Self {
        Self {
            store,
            space: space.into(),
            _keys: PhantomData,
        }
    }

    /// Add `id` to the set at `[primary][secondary]`, creating it if absent.
    /// Returns true iff the id was newly added.
    pub fn add_entry(&self, primary: &K, secondary: &T, id: RelationId) -> Result<bool, GraphError> {
        self.store
            .set_insert(&self.space, &composite_key(primary, secondary)?, id.0)
    }

    /// Remove `id` from the set at `[primary][secondary]`; empty sets are pruned.
    /// Returns true iff the id was present.
    pub fn remove_entry(
        &self,
        primary: &K,
        secondary: &T,
        id: RelationId,
    ) -> Result<bool, GraphError> {
        self.store
            .set_remove(&self.space, &composite_key(primary, secondary)?, id.0)
    }

    /// Drop every entry keyed by `primary`.
    ///
    /// Entries where `primary` only appears as a secondary key elsewhere are
    /// left alone. Returns how many `(primary, secondary)` sets were removed.
    pub fn remove_all_for_key(&self, primary: &K) -> Result<usize, GraphError> {
        self.store.remove_sets(&self.space, &encode(primary)?)
    }

    /// All secondary keys and their ids for `primary`.
    pub fn lookup(&self, primary: &K) -> Result<BTreeMap<T, BTreeSet<RelationId>>, GraphError> {
        let mut found = BTreeMap::new();
        for (key, members) in self.store.scan_sets(&self.space, &encode(primary)?)? {
            let (_, secondary): (K, T) = split_composite(&key)?;
            found.insert(secondary, to_ids(members));
        }
        Ok(found)
    }

    /// Ids at `[primary][secondary]` (empty if absent).
    pub fn lookup_entry(
        &self,
        primary: &K,
        secondary: &T,
    ) -> Result<BTreeSet<RelationId>, GraphError> {
        let members = self
            .store
            .set_members(&self.space, &composite_key(primary, secondary)?)?;
        Ok(to_ids(members))
    }

    /// Every primary holding an entry under `secondary`.
    ///
    /// Full index scan; used for incoming-relation queries.
    pub fn entries_with_secondary(
        &self,
        secondary: &T,
    ) -> Result<Vec<(K, BTreeSet<RelationId>)>, GraphError> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|(_, s, _)| s == secondary)
            .map(|(primary, _, ids)| (primary, ids))
            .collect())
    }

    /// Every entry in the index.
    pub fn entries(&self) -> Result<Vec<IndexEntry<K, T>>, GraphError> {
        self.store
            .scan_sets(&self.space, &[])?
            .into_iter()
            .map(|(key, members)| {
                let (primary, secondary) = split_composite(&key)?;
                Ok((primary, secondary, to_ids(members)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn adjacency() -> AdjacencyIndex<MemoryStore, String> {
        RelationIndex::new(Arc::new(MemoryStore::new()), "g_from2to")
    }

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn add_and_lookup() {
        let index = adjacency();
        assert!(index.add_entry(&s("A"), &s("B"), RelationId(1)).expect("add"));
        assert!(index.add_entry(&s("A"), &s("B"), RelationId(2)).expect("add"));
        assert!(index.add_entry(&s("A"), &s("C"), RelationId(3)).expect("add"));
        assert!(!index.add_entry(&s("A"), &s("C"), RelationId(3)).expect("add"));

        let map = index.lookup(&s("A")).expect("lookup");
        assert_eq!(map.len(), 2);
        assert_eq!(map[&s("B")], BTreeSet::from([RelationId(1), RelationId(2)]));
        assert_eq!(
            index.lookup_entry(&s("A"), &s("C")).expect("entry"),
            BTreeSet::from([RelationId(3)])
        );
    }

    #[test]
    fn lookup_does_not_leak_between_similar_keys() {
        let index = adjacency();
        index.add_entry(&s("A"), &s("B"), RelationId(1)).expect("add");
        index.add_entry(&s("AB"), &s("C"), RelationId(2)).expect("add");

        let map = index.lookup(&s("A")).expect("lookup");
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["B"]);
    }

    #[test]
    fn remove_entry_prunes() {
        let index = adjacency();
        index.add_entry(&s("A"), &s("B"), RelationId(1)).expect("add");
        assert!(index.remove_entry(&s("A"), &s("B"), RelationId(1)).expect("remove"));
        assert!(!index.remove_entry(&s("A"), &s("B"), RelationId(1)).expect("remove"));
        assert!(index.lookup(&s("A")).expect("lookup").is_empty());
        assert!(index.entries().expect("entries").is_empty());
    }

    #[test]
    fn remove_all_for_key_keeps_secondary_mentions() {
        let index = adjacency();
        index.add_entry(&s("A"), &s("B"), RelationId(1)).expect("add");
        index.add_entry(&s("A"), &s("C"), RelationId(2)).expect("add");
        index.add_entry(&s("B"), &s("A"), RelationId(3)).expect("add");

        assert_eq!(index.remove_all_for_key(&s("A")).expect("remove"), 2);
        assert!(index.lookup(&s("A")).expect("lookup").is_empty());
        assert_eq!(
            index.lookup_entry(&s("B"), &s("A")).expect("entry"),
            BTreeSet::from([RelationId(3)])
        );
    }

    #[test]
    fn entries_with_secondary_finds_incoming() {
        let index = adjacency();
        index.add_entry(&s("A"), &s("C"), RelationId(1)).expect("add");
        index.add_entry(&s("B"), &s("C"), RelationId(2)).expect("add");
        index.add_entry(&s("B"), &s("D"), RelationId(3)).expect("add");

        let incoming = index.entries_with_secondary(&s("C")).expect("scan");
        let sources: Vec<_> = incoming.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(sources, vec!["A", "B"]);
    }

    #[test]
    fn type_index_uses_string_secondary() {
        let index: TypeIndex<MemoryStore, String> =
            RelationIndex::new(Arc::new(MemoryStore::new()), "g_from2type");
        index.add_entry(&s("A"), &s("knows"), RelationId(1)).expect("add");
        index.add_entry(&s("A"), &s("likes"), RelationId(2)).expect("add");

        let types: Vec<_> = index.lookup(&s("A")).expect("lookup").into_keys().collect();
        assert_eq!(types, vec!["knows", "likes"]);
    }
}
