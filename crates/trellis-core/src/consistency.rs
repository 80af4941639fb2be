//! # Consistency
//!
//! Offline checker and repair for the derived indexes.
//!
//! The relation table is authoritative. Expected index entries are computed
//! from it and diffed against what the indexes actually hold. Repair removes
//! relations whose endpoint node is gone, then drops dangling entries, adds
//! missing ones and writes the reverse record of any half-written
//! bidirectional pair.
//!
//! Scans are not atomic with respect to concurrent writers. Run against a
//! quiescent graph or expect transient false positives.

use crate::config::BidirectionalPolicy;
use crate::graph::GraphService;
use crate::storage::KvStore;
use crate::{GraphError, GraphKey, Relation, RelationId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// A single index entry that disagrees with the relation table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum IndexFault<K> {
    /// `[from][to]` in the adjacency index.
    Adjacency {
        /// Holder key.
        from: K,
        /// Neighbor key.
        to: K,
        /// Relation id.
        relation: RelationId,
    },
    /// `[key][relation_type]` in the type index.
    Type {
        /// Holder key.
        key: K,
        /// Relation type.
        relation_type: String,
        /// Relation id.
        relation: RelationId,
    },
}

/// Result of a consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport<K> {
    /// Index entries with no matching relation record.
    pub dangling: Vec<IndexFault<K>>,
    /// Index entries a relation record requires but the index lacks.
    pub missing: Vec<IndexFault<K>>,
    /// Relations with an endpoint that is not a node.
    pub orphaned: Vec<RelationId>,
    /// Two-record bidirectional relations whose reverse record is missing.
    pub unpaired: Vec<RelationId>,
}

impl<K> Default for ConsistencyReport<K> {
    fn default() -> Self {
        Self {
            dangling: Vec::new(),
            missing: Vec::new(),
            orphaned: Vec::new(),
            unpaired: Vec::new(),
        }
    }
}

impl<K> ConsistencyReport<K> {
    /// True when nothing was found.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.dangling.is_empty()
            && self.missing.is_empty()
            && self.orphaned.is_empty()
            && self.unpaired.is_empty()
    }
}

/// Bidirectional records grouped by `(from, to, type)`, ids ascending.
type Halves<K> = BTreeMap<(K, K, String), Vec<RelationId>>;

/// Ids in each group beyond what the reverse group can pair with.
fn unpaired<K: GraphKey>(halves: &Halves<K>) -> Vec<RelationId> {
    let mut surplus = Vec::new();
    for ((from, to, relation_type), ids) in halves {
        let extra = if from == to {
            ids.len() % 2
        } else {
            let reverse = halves
                .get(&(to.clone(), from.clone(), relation_type.clone()))
                .map_or(0, Vec::len);
            ids.len().saturating_sub(reverse)
        };
        surplus.extend(ids.iter().rev().take(extra));
    }
    surplus.sort();
    surplus
}

impl<S: KvStore, K: GraphKey> GraphService<S, K> {
    fn expected_entries(&self, relation: &Relation<K>, out: &mut BTreeSet<IndexFault<K>>) {
        let mut holders = vec![(relation.from.clone(), relation.to.clone())];
        if self.is_mirrored(relation) {
            holders.push((relation.to.clone(), relation.from.clone()));
        }
        for (holder, neighbor) in holders {
            out.insert(IndexFault::Type {
                key: holder.clone(),
                relation_type: relation.relation_type.clone(),
                relation: relation.id,
            });
            out.insert(IndexFault::Adjacency {
                from: holder,
                to: neighbor,
                relation: relation.id,
            });
        }
    }

    fn actual_entries(&self) -> Result<BTreeSet<IndexFault<K>>, GraphError> {
        let mut actual = BTreeSet::new();
        for (from, to, ids) in self.adjacency().entries()? {
            for relation in ids {
                actual.insert(IndexFault::Adjacency {
                    from: from.clone(),
                    to: to.clone(),
                    relation,
                });
            }
        }
        for (key, relation_type, ids) in self.types().entries()? {
            for relation in ids {
                actual.insert(IndexFault::Type {
                    key: key.clone(),
                    relation_type: relation_type.clone(),
                    relation,
                });
            }
        }
        Ok(actual)
    }

    /// Diff both indexes against the relation table. Read-only.
    pub fn check_consistency(&self) -> Result<ConsistencyReport<K>, GraphError> {
        let nodes: BTreeSet<K> = self.nodes().keys()?.into_iter().collect();

        let mut report = ConsistencyReport::default();
        let mut expected = BTreeSet::new();
        let mut halves: Halves<K> = BTreeMap::new();
        for relation in self.relations().all()? {
            if !nodes.contains(&relation.from) || !nodes.contains(&relation.to) {
                report.orphaned.push(relation.id);
            }
            self.expected_entries(&relation, &mut expected);
            if relation.bidirectional {
                halves
                    .entry((relation.from, relation.to, relation.relation_type))
                    .or_default()
                    .push(relation.id);
            }
        }
        if self.config().bidirectional == BidirectionalPolicy::SeparateRecords {
            report.unpaired = unpaired(&halves);
        }

        let actual = self.actual_entries()?;
        report.dangling = actual.difference(&expected).cloned().collect();
        report.missing = expected.difference(&actual).cloned().collect();

        if !report.is_consistent() {
            warn!(
                graph = %self.config().name,
                dangling = report.dangling.len(),
                missing = report.missing.len(),
                orphaned = report.orphaned.len(),
                unpaired = report.unpaired.len(),
                "graph indexes inconsistent"
            );
        }
        Ok(report)
    }

    fn apply(&self, fault: &IndexFault<K>, add: bool) -> Result<(), GraphError> {
        match fault {
            IndexFault::Adjacency { from, to, relation } => {
                if add {
                    self.adjacency().add_entry(from, to, *relation)?;
                } else {
                    self.adjacency().remove_entry(from, to, *relation)?;
                }
            }
            IndexFault::Type {
                key,
                relation_type,
                relation,
            } => {
                if add {
                    self.types().add_entry(key, relation_type, *relation)?;
                } else {
                    self.types().remove_entry(key, relation_type, *relation)?;
                }
            }
        }
        Ok(())
    }

    /// Remove orphaned relations, make both indexes match the relation
    /// table, then write the missing reverse record of each unpaired
    /// relation. Returns what was fixed.
    pub fn repair(&self) -> Result<ConsistencyReport<K>, GraphError> {
        self.ensure_writable()?;

        let orphaned = self.check_consistency()?.orphaned;
        for id in &orphaned {
            self.remove_relation_by_id(*id)?;
        }

        let mut report = self.check_consistency()?;
        for fault in &report.dangling {
            self.apply(fault, false)?;
        }
        for fault in &report.missing {
            self.apply(fault, true)?;
        }
        for id in &report.unpaired {
            if let Some(half) = self.relations().get(*id)? {
                self.link(&half.to, &half.from, &half.relation_type, half.value, true)?;
            }
        }
        report.orphaned = orphaned;

        info!(
            graph = %self.config().name,
            dangling = report.dangling.len(),
            missing = report.missing.len(),
            orphaned = report.orphaned.len(),
            unpaired = report.unpaired.len(),
            "graph repaired"
        );
        Ok(report)
    }
}
