//! # Relation Store
//!
//! RelationId -> Relation table, the single source of truth for edge data.
//! Ids are allocated by the identity sequence, never here.

use crate::storage::KvStore;
use crate::storage::codec::{decode, encode, relation_key};
use crate::{GraphError, GraphKey, Relation, RelationId};
use std::marker::PhantomData;
use std::sync::Arc;

/// Relation table over a substrate keyspace.
#[derive(Debug)]
pub struct RelationStore<S, K> {
    store: Arc<S>,
    space: String,
    _key: PhantomData<fn() -> K>,
}

impl<S, K> Clone for RelationStore<S, K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            space: self.space.clone(),
            _key: PhantomData,
        }
    }
}

impl<S: KvStore, K: GraphKey> RelationStore<S, K> {
    /// Create a relation store over the given keyspace.
    pub fn new(store: Arc<S>, space: impl Into<String>) -> Self {
        Self {
            store,
            space: space.into(),
            _key: PhantomData,
        }
    }

    /// Persist a pre-built record under its id.
    pub fn create(&self, record: Relation<K>) -> Result<Relation<K>, GraphError> {
        self.store
            .put(&self.space, &relation_key(record.id), &encode(&record)?)?;
        Ok(record)
    }

    /// Read a record.
    pub fn get(&self, id: RelationId) -> Result<Option<Relation<K>>, GraphError> {
        self.store
            .get(&self.space, &relation_key(id))?
            .map(|data| decode(&data))
            .transpose()
    }

    /// Delete a record. Returns whether it existed.
    pub fn delete(&self, id: RelationId) -> Result<bool, GraphError> {
        self.store.remove(&self.space, &relation_key(id))
    }

    /// Every record, in id order.
    pub fn all(&self) -> Result<Vec<Relation<K>>, GraphError> {
        self.store
            .scan(&self.space, &[])?
            .iter()
            .map(|(_, data)| decode(data))
            .collect()
    }

    /// Every record with `key` as either endpoint.
    ///
    /// A linear scan over the authoritative table, so it still finds
    /// relations whose index entries were lost mid-operation.
    pub fn scan_by_endpoint(&self, key: &K) -> Result<Vec<Relation<K>>, GraphError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|relation| relation.touches(key))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Payload;
    use crate::storage::MemoryStore;

    fn store() -> RelationStore<MemoryStore, String> {
        RelationStore::new(Arc::new(MemoryStore::new()), "g_relations")
    }

    fn rel(id: u64, from: &str, to: &str) -> Relation<String> {
        Relation::new(
            RelationId(id),
            from.to_string(),
            to.to_string(),
            "knows",
            Payload::from("v"),
            false,
        )
    }

    #[test]
    fn create_get_delete() {
        let relations = store();
        relations.create(rel(1, "A", "B")).expect("create");

        let fetched = relations.get(RelationId(1)).expect("get");
        assert_eq!(fetched, Some(rel(1, "A", "B")));

        assert!(relations.delete(RelationId(1)).expect("delete"));
        assert!(!relations.delete(RelationId(1)).expect("delete"));
        assert!(relations.get(RelationId(1)).expect("get").is_none());
    }

    #[test]
    fn all_returns_id_order() {
        let relations = store();
        for id in [300, 2, 17] {
            relations.create(rel(id, "A", "B")).expect("create");
        }
        let ids: Vec<_> = relations
            .all()
            .expect("all")
            .into_iter()
            .map(|r| r.id.value())
            .collect();
        assert_eq!(ids, vec![2, 17, 300]);
    }

    #[test]
    fn scan_by_endpoint_matches_either_side() {
        let relations = store();
        relations.create(rel(1, "A", "B")).expect("create");
        relations.create(rel(2, "C", "A")).expect("create");
        relations.create(rel(3, "B", "C")).expect("create");

        let ids: Vec<_> = relations
            .scan_by_endpoint(&"A".to_string())
            .expect("scan")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![RelationId(1), RelationId(2)]);
    }
}
