//! # Graph Service
//!
//! Orchestrates the node table, relation table, adjacency index and type
//! index into the node/relation CRUD and query API.
//!
//! The service is stateless: it holds handles to substrate keyspaces and its
//! configuration, nothing else. Every multi-step operation is a sequence of
//! independent single-key steps with no cross-step atomicity, so:
//! - writes go record first, index second
//! - reads never assume an index hit implies a record hit; stale ids are
//!   logged and skipped
//! - `consistency` can rebuild the indexes after a crash mid-operation

use crate::config::{BidirectionalPolicy, GraphConfig};
use crate::index::{AdjacencyIndex, TypeIndex};
use crate::nodes::NodeStore;
use crate::primitives::MAX_RELATION_TYPE_LENGTH;
use crate::relations::RelationStore;
use crate::sequence::IdentitySequence;
use crate::storage::KvStore;
use crate::{GraphError, GraphKey, Payload, Relation, RelationId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

// =============================================================================
// CASCADE REPORTING
// =============================================================================

/// A sub-step of `remove_node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CascadeStep {
    /// Gathering the relations that touch the node.
    ScanRelations,
    /// Removing one touching relation.
    RemoveRelation(RelationId),
    /// Dropping the node's adjacency entries.
    ClearAdjacency,
    /// Dropping the node's type entries.
    ClearTypes,
    /// Deleting the node record.
    RemoveNode,
}

impl fmt::Display for CascadeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScanRelations => write!(f, "scan relations"),
            Self::RemoveRelation(id) => write!(f, "remove relation {id}"),
            Self::ClearAdjacency => write!(f, "clear adjacency index"),
            Self::ClearTypes => write!(f, "clear type index"),
            Self::RemoveNode => write!(f, "remove node"),
        }
    }
}

/// A failed cascade sub-step and the error it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeFailure {
    /// The step that failed.
    pub step: CascadeStep,
    /// Rendered error.
    pub error: String,
}

/// Outcome of `remove_node`.
///
/// Cascades are best effort: every step runs even if an earlier one failed,
/// and nothing is rolled back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeRemoval {
    /// Whether the node record itself was deleted.
    pub node_removed: bool,
    /// Relations deleted by this cascade.
    pub relations_removed: Vec<RelationId>,
    /// Sub-steps that failed.
    pub failures: Vec<CascadeFailure>,
}

impl NodeRemoval {
    /// True when no sub-step failed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn an incomplete removal into `GraphError::CascadeIncomplete`.
    pub fn into_result(self) -> Result<Self, GraphError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(GraphError::CascadeIncomplete(
                self.failures
                    .iter()
                    .map(|f| format!("{}: {}", f.step, f.error))
                    .collect(),
            ))
        }
    }

    fn record(&mut self, step: CascadeStep, error: &GraphError) {
        warn!(step = %step, error = %error, "cascade step failed");
        self.failures.push(CascadeFailure {
            step,
            error: error.to_string(),
        });
    }
}

/// Whole-graph counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    /// Number of nodes.
    pub node_count: usize,
    /// Number of relation records.
    pub relation_count: usize,
    /// Relation records flagged bidirectional.
    pub bidirectional_count: usize,
    /// Relation records per type.
    pub relation_types: BTreeMap<String, usize>,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Check a relation type label.
///
/// Non-empty and at most `MAX_RELATION_TYPE_LENGTH` bytes.
pub fn validate_relation_type(relation_type: &str) -> Result<(), GraphError> {
    if relation_type.is_empty() || relation_type.len() > MAX_RELATION_TYPE_LENGTH {
        return Err(GraphError::InvalidRelationType(relation_type.to_string()));
    }
    Ok(())
}

// =============================================================================
// GRAPH SERVICE
// =============================================================================

/// The graph overlay API.
///
/// Cheap to clone; clones share the same substrate and can be used from any
/// number of threads.
#[derive(Debug)]
pub struct GraphService<S, K = String> {
    config: GraphConfig,
    nodes: NodeStore<S, K>,
    relations: RelationStore<S, K>,
    adjacency: AdjacencyIndex<S, K>,
    types: TypeIndex<S, K>,
    ids: IdentitySequence<S>,
}

impl<S, K> Clone for GraphService<S, K> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            nodes: self.nodes.clone(),
            relations: self.relations.clone(),
            adjacency: self.adjacency.clone(),
            types: self.types.clone(),
            ids: self.ids.clone(),
        }
    }
}

impl<S: KvStore, K: GraphKey> GraphService<S, K> {
    /// Create a service that owns its substrate.
    pub fn new(store: S, config: GraphConfig) -> Self {
        Self::with_shared(Arc::new(store), config)
    }

    /// Create a service over a shared substrate, using the configured id counter.
    pub fn with_shared(store: Arc<S>, config: GraphConfig) -> Self {
        let ids = IdentitySequence::new(Arc::clone(&store), config.id_sequence.clone());
        Self::with_sequence(store, config, ids)
    }

    /// Create a service with an explicit identity sequence.
    pub fn with_sequence(store: Arc<S>, config: GraphConfig, ids: IdentitySequence<S>) -> Self {
        Self {
            nodes: NodeStore::new(Arc::clone(&store), config.nodes_space()),
            relations: RelationStore::new(Arc::clone(&store), config.relations_space()),
            adjacency: AdjacencyIndex::new(Arc::clone(&store), config.adjacency_space()),
            types: TypeIndex::new(store, config.types_space()),
            ids,
            config,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// The node table.
    #[must_use]
    pub fn nodes(&self) -> &NodeStore<S, K> {
        &self.nodes
    }

    /// The relation table.
    #[must_use]
    pub fn relations(&self) -> &RelationStore<S, K> {
        &self.relations
    }

    /// The from -> to index.
    #[must_use]
    pub fn adjacency(&self) -> &AdjacencyIndex<S, K> {
        &self.adjacency
    }

    /// The from -> type index.
    #[must_use]
    pub fn types(&self) -> &TypeIndex<S, K> {
        &self.types
    }

    /// Whether `relation` is indexed at its `to` endpoint as well.
    ///
    /// Only shared-record bidirectional relations are. The policy is a
    /// property of the graph and must not change over its lifetime.
    #[must_use]
    pub fn is_mirrored(&self, relation: &Relation<K>) -> bool {
        relation.bidirectional && self.config.bidirectional == BidirectionalPolicy::SharedRecord
    }

    pub(crate) fn ensure_writable(&self) -> Result<(), GraphError> {
        if self.config.read_only {
            return Err(GraphError::ReadOnly);
        }
        Ok(())
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Add a node. Returns false, leaving the existing payload, if the key exists.
    pub fn add_node(&self, key: &K, value: impl Into<Payload>) -> Result<bool, GraphError> {
        self.ensure_writable()?;
        let created = self.nodes.create(key, &value.into())?;
        debug!(graph = %self.config.name, key = ?key, created, "add node");
        Ok(created)
    }

    /// Read a node payload.
    pub fn get_node(&self, key: &K) -> Result<Option<Payload>, GraphError> {
        self.nodes.get(key)
    }

    /// Overwrite the payload of an existing node.
    pub fn update_node(&self, key: &K, value: impl Into<Payload>) -> Result<(), GraphError> {
        self.ensure_writable()?;
        if !self.nodes.replace(key, &value.into())? {
            return Err(GraphError::NodeNotFound(format!("{key:?}")));
        }
        debug!(graph = %self.config.name, key = ?key, "update node");
        Ok(())
    }

    /// Remove a node and cascade to every relation and index entry touching it.
    ///
    /// Steps: gather touching relations from the relation table, remove each
    /// (with its bidirectional partner), clear the node's own index entries,
    /// delete the node. A failing step is recorded in the returned report and
    /// the remaining steps still run. Only a read-only graph fails outright.
    pub fn remove_node(&self, key: &K) -> Result<NodeRemoval, GraphError> {
        self.ensure_writable()?;
        let mut removal = NodeRemoval::default();

        match self.relations.scan_by_endpoint(key) {
            Ok(touching) => {
                for relation in touching {
                    if removal.relations_removed.contains(&relation.id) {
                        continue;
                    }
                    match self.remove_with_partner(relation.id) {
                        Ok(removed) => removal.relations_removed.extend(removed),
                        Err(e) => removal.record(CascadeStep::RemoveRelation(relation.id), &e),
                    }
                }
            }
            Err(e) => removal.record(CascadeStep::ScanRelations, &e),
        }

        if let Err(e) = self.adjacency.remove_all_for_key(key) {
            removal.record(CascadeStep::ClearAdjacency, &e);
        }
        if let Err(e) = self.types.remove_all_for_key(key) {
            removal.record(CascadeStep::ClearTypes, &e);
        }

        match self.nodes.delete(key) {
            Ok(true) => removal.node_removed = true,
            Ok(false) => removal.record(
                CascadeStep::RemoveNode,
                &GraphError::NodeNotFound(format!("{key:?}")),
            ),
            Err(e) => removal.record(CascadeStep::RemoveNode, &e),
        }

        debug!(
            graph = %self.config.name,
            key = ?key,
            relations = removal.relations_removed.len(),
            failures = removal.failures.len(),
            "remove node"
        );
        Ok(removal)
    }

    // =========================================================================
    // Relations
    // =========================================================================

    /// Add a relation between two existing nodes.
    ///
    /// Returns one id for a directed relation. For a bidirectional relation
    /// it returns two ids (`from -> to`, then `to -> from`) under
    /// `SeparateRecords`, or one mirrored id under `SharedRecord`.
    ///
    /// # Errors
    ///
    /// `EndpointNotFound` if either node is missing; nothing is written and no
    /// id is consumed in that case.
    ///
    /// `IncompleteBidirectional` if the reverse record of a `SeparateRecords`
    /// pair could not be written. The forward record stays and is reported
    /// as unpaired by `check_consistency`.
    pub fn add_relation(
        &self,
        from: &K,
        to: &K,
        relation_type: &str,
        value: impl Into<Payload>,
        bidirectional: bool,
    ) -> Result<Vec<RelationId>, GraphError> {
        self.ensure_writable()?;
        validate_relation_type(relation_type)?;

        for endpoint in [from, to] {
            if !self.nodes.contains(endpoint)? {
                return Err(GraphError::EndpointNotFound(format!("{endpoint:?}")));
            }
        }

        let value = value.into();
        if !bidirectional {
            return Ok(vec![self.link(from, to, relation_type, value, false)?]);
        }

        match self.config.bidirectional {
            BidirectionalPolicy::SeparateRecords => {
                let forward = self.link(from, to, relation_type, value.clone(), true)?;
                match self.link(to, from, relation_type, value, true) {
                    Ok(backward) => Ok(vec![forward, backward]),
                    Err(e) => {
                        warn!(
                            graph = %self.config.name,
                            id = %forward,
                            error = %e,
                            "reverse record not written"
                        );
                        Err(GraphError::IncompleteBidirectional {
                            relation: forward,
                            reason: e.to_string(),
                        })
                    }
                }
            }
            BidirectionalPolicy::SharedRecord => {
                Ok(vec![self.link(from, to, relation_type, value, true)?])
            }
        }
    }

    /// Allocate an id, persist the record, then index it.
    pub(crate) fn link(
        &self,
        from: &K,
        to: &K,
        relation_type: &str,
        value: Payload,
        bidirectional: bool,
    ) -> Result<RelationId, GraphError> {
        let id = self.ids.next()?;
        let relation = self.relations.create(Relation::new(
            id,
            from.clone(),
            to.clone(),
            relation_type,
            value,
            bidirectional,
        ))?;
        self.index_relation(&relation)?;
        debug!(
            graph = %self.config.name,
            id = %id,
            from = ?from,
            to = ?to,
            relation_type,
            bidirectional,
            "add relation"
        );
        Ok(id)
    }

    pub(crate) fn index_relation(&self, relation: &Relation<K>) -> Result<(), GraphError> {
        self.adjacency
            .add_entry(&relation.from, &relation.to, relation.id)?;
        self.types
            .add_entry(&relation.from, &relation.relation_type, relation.id)?;
        if self.is_mirrored(relation) {
            self.adjacency
                .add_entry(&relation.to, &relation.from, relation.id)?;
            self.types
                .add_entry(&relation.to, &relation.relation_type, relation.id)?;
        }
        Ok(())
    }

    fn unindex_relation(&self, relation: &Relation<K>) -> Result<(), GraphError> {
        self.adjacency
            .remove_entry(&relation.from, &relation.to, relation.id)?;
        self.types
            .remove_entry(&relation.from, &relation.relation_type, relation.id)?;
        if self.is_mirrored(relation) {
            self.adjacency
                .remove_entry(&relation.to, &relation.from, relation.id)?;
            self.types
                .remove_entry(&relation.to, &relation.relation_type, relation.id)?;
        }
        Ok(())
    }

    /// The reverse record of a `SeparateRecords` bidirectional relation:
    /// `to -> from`, same type, also bidirectional, nearest in id.
    fn partner_of(&self, relation: &Relation<K>) -> Result<Option<RelationId>, GraphError> {
        if !relation.bidirectional || self.is_mirrored(relation) {
            return Ok(None);
        }
        let mut nearest: Option<(u64, RelationId)> = None;
        for id in self.adjacency.lookup_entry(&relation.to, &relation.from)? {
            if id == relation.id {
                continue;
            }
            let Some(candidate) = self.relations.get(id)? else {
                continue;
            };
            let pairs = candidate.bidirectional
                && candidate.relation_type == relation.relation_type
                && candidate.from == relation.to
                && candidate.to == relation.from;
            let distance = id.value().abs_diff(relation.id.value());
            if pairs && nearest.is_none_or(|(best, _)| distance < best) {
                nearest = Some((distance, id));
            }
        }
        Ok(nearest.map(|(_, id)| id))
    }

    fn remove_record(&self, relation: &Relation<K>) -> Result<bool, GraphError> {
        let removed = self.relations.delete(relation.id)?;
        // Unindex even if a concurrent remover deleted the record first.
        self.unindex_relation(relation)?;
        debug!(graph = %self.config.name, id = %relation.id, removed, "remove relation");
        Ok(removed)
    }

    /// Remove a relation and, for a two-record bidirectional relation, its
    /// partner. Returns the ids this call deleted.
    fn remove_with_partner(&self, id: RelationId) -> Result<Vec<RelationId>, GraphError> {
        let Some(relation) = self.relations.get(id)? else {
            return Ok(Vec::new());
        };

        let mut removed = Vec::new();
        if self.remove_record(&relation)? {
            removed.push(id);
        }
        let partner = match self.partner_of(&relation)? {
            Some(partner) => self.relations.get(partner)?,
            None => None,
        };
        if let Some(partner) = partner {
            if self.remove_record(&partner)? {
                removed.push(partner.id);
            }
        }
        Ok(removed)
    }

    /// Remove a relation by id. Returns false if the id is unknown.
    ///
    /// Removing either half of a `SeparateRecords` bidirectional relation
    /// removes both.
    pub fn remove_relation_by_id(&self, id: RelationId) -> Result<bool, GraphError> {
        self.ensure_writable()?;
        Ok(self.remove_with_partner(id)?.contains(&id))
    }

    /// Remove every `from -> to` relation of the given type.
    ///
    /// Returns true only if at least one relation matched and every matched
    /// removal succeeded.
    pub fn remove_relation(&self, from: &K, to: &K, relation_type: &str) -> Result<bool, GraphError> {
        self.ensure_writable()?;

        let mut matched = false;
        let mut all_removed = true;
        let mut removed = BTreeSet::new();
        for id in self.adjacency.lookup_entry(from, to)? {
            if removed.contains(&id) {
                continue;
            }
            match self.relations.get(id)? {
                Some(relation) if relation.relation_type == relation_type => {
                    matched = true;
                    let gone = self.remove_with_partner(id)?;
                    all_removed &= gone.contains(&id);
                    removed.extend(gone);
                }
                Some(_) => {}
                None => self.report_stale(from, id),
            }
        }
        Ok(matched && all_removed)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn report_stale(&self, key: &K, id: RelationId) {
        let err = GraphError::IndexInconsistency {
            relation: id,
            key: format!("{key:?}"),
        };
        warn!(graph = %self.config.name, error = %err, "skipping stale index entry");
    }

    /// Fetch records for index ids held at `holder`, skipping stale ids.
    fn resolve(
        &self,
        holder: &K,
        ids: impl IntoIterator<Item = RelationId>,
    ) -> Result<Vec<Relation<K>>, GraphError> {
        let mut found = Vec::new();
        for id in ids {
            match self.relations.get(id)? {
                Some(relation) => found.push(relation),
                None => self.report_stale(holder, id),
            }
        }
        Ok(found)
    }

    /// Fetch a relation by id.
    pub fn relation(&self, id: RelationId) -> Result<Option<Relation<K>>, GraphError> {
        self.relations.get(id)
    }

    /// Relations indexed at `key`, in id order.
    pub fn outgoing_relations(&self, key: &K) -> Result<Vec<Relation<K>>, GraphError> {
        let ids: BTreeSet<RelationId> = self
            .adjacency
            .lookup(key)?
            .into_values()
            .flatten()
            .collect();
        self.resolve(key, ids)
    }

    /// Relations of one type indexed at `key`, in id order.
    pub fn outgoing_relations_of_type(
        &self,
        key: &K,
        relation_type: &str,
    ) -> Result<Vec<Relation<K>>, GraphError> {
        let ids = self.types.lookup_entry(key, &relation_type.to_string())?;
        self.resolve(key, ids)
    }

    /// Relations pointing at `key` from any node, in id order.
    ///
    /// Scans the whole adjacency index.
    pub fn incoming_relations(&self, key: &K) -> Result<Vec<Relation<K>>, GraphError> {
        let mut found = Vec::new();
        let mut seen = BTreeSet::new();
        for (holder, ids) in self.adjacency.entries_with_secondary(key)? {
            let fresh: Vec<RelationId> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
            found.extend(self.resolve(&holder, fresh)?);
        }
        found.sort_by_key(|relation| relation.id);
        Ok(found)
    }

    /// Incoming relations of one type.
    pub fn incoming_relations_of_type(
        &self,
        key: &K,
        relation_type: &str,
    ) -> Result<Vec<Relation<K>>, GraphError> {
        Ok(self
            .incoming_relations(key)?
            .into_iter()
            .filter(|relation| relation.relation_type == relation_type)
            .collect())
    }

    /// Number of live relations indexed at `key`. Zero for unknown keys.
    pub fn node_out_degree(&self, key: &K) -> Result<usize, GraphError> {
        Ok(self.outgoing_relations(key)?.len())
    }

    /// Whether at least one live relation is indexed at `[from][to]`.
    pub fn are_related(&self, from: &K, to: &K) -> Result<bool, GraphError> {
        for id in self.adjacency.lookup_entry(from, to)? {
            if self.relations.get(id)?.is_some() {
                return Ok(true);
            }
            self.report_stale(from, id);
        }
        Ok(false)
    }

    /// Live relations indexed at `[from][to]`, in id order.
    pub fn relations_between(&self, from: &K, to: &K) -> Result<Vec<Relation<K>>, GraphError> {
        let ids = self.adjacency.lookup_entry(from, to)?;
        self.resolve(from, ids)
    }

    /// Distinct relation types between `from` and `to`, sorted.
    pub fn relation_types(&self, from: &K, to: &K) -> Result<Vec<String>, GraphError> {
        let types: BTreeSet<String> = self
            .relations_between(from, to)?
            .into_iter()
            .map(|relation| relation.relation_type)
            .collect();
        Ok(types.into_iter().collect())
    }

    /// Whole-graph counters, computed by full scans.
    pub fn stats(&self) -> Result<GraphStats, GraphError> {
        let mut stats = GraphStats {
            node_count: self.nodes.keys()?.len(),
            ..GraphStats::default()
        };
        for relation in self.relations.all()? {
            stats.relation_count += 1;
            if relation.bidirectional {
                stats.bidirectional_count += 1;
            }
            *stats
                .relation_types
                .entry(relation.relation_type)
                .or_insert(0) += 1;
        }
        Ok(stats)
    }
}

// =============================================================================
// TESTS
// =============================================================================
