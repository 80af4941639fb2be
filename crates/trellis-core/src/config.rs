//! # Graph Configuration
//!
//! Settings that shape how a `GraphService` lays out and mutates its data.
//! Every field has a default so partial TOML files deserialize cleanly.

use crate::primitives::{
    ADJACENCY_SUFFIX, DEFAULT_GRAPH_NAME, DEFAULT_ID_SEQUENCE, NODES_SUFFIX, RELATIONS_SUFFIX,
    TYPES_SUFFIX, keyspace,
};
use serde::{Deserialize, Serialize};

/// How a bidirectional relation is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidirectionalPolicy {
    /// Two records, two ids: `from -> to` and `to -> from`, each removable on its own.
    #[default]
    SeparateRecords,
    /// One record, one id, indexed at both endpoints.
    SharedRecord,
}

/// Configuration for a graph overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Graph name, used as the keyspace prefix.
    pub name: String,
    /// Reject every mutation with `GraphError::ReadOnly`.
    pub read_only: bool,
    /// Bidirectional relation policy.
    pub bidirectional: BidirectionalPolicy,
    /// Substrate counter used for relation ids.
    pub id_sequence: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_GRAPH_NAME.to_string(),
            read_only: false,
            bidirectional: BidirectionalPolicy::default(),
            id_sequence: DEFAULT_ID_SEQUENCE.to_string(),
        }
    }
}

impl GraphConfig {
    /// Create a default configuration for the named graph.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the bidirectional policy.
    #[must_use]
    pub fn with_bidirectional(mut self, policy: BidirectionalPolicy) -> Self {
        self.bidirectional = policy;
        self
    }

    /// Mark the graph read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Node table keyspace.
    #[must_use]
    pub fn nodes_space(&self) -> String {
        keyspace(&self.name, NODES_SUFFIX)
    }

    /// Relation table keyspace.
    #[must_use]
    pub fn relations_space(&self) -> String {
        keyspace(&self.name, RELATIONS_SUFFIX)
    }

    /// Adjacency index keyspace.
    #[must_use]
    pub fn adjacency_space(&self) -> String {
        keyspace(&self.name, ADJACENCY_SUFFIX)
    }

    /// Type index keyspace.
    #[must_use]
    pub fn types_space(&self) -> String {
        keyspace(&self.name, TYPES_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_primitives() {
        let config = GraphConfig::default();
        assert_eq!(config.name, "graph");
        assert!(!config.read_only);
        assert_eq!(config.bidirectional, BidirectionalPolicy::SeparateRecords);
        assert_eq!(config.id_sequence, "relations_id_generator");
    }

    #[test]
    fn keyspaces_follow_graph_name() {
        let config = GraphConfig::named("multimap");
        assert_eq!(config.nodes_space(), "multimap_nodes");
        assert_eq!(config.relations_space(), "multimap_relations");
        assert_eq!(config.adjacency_space(), "multimap_from2to");
        assert_eq!(config.types_space(), "multimap_from2type");
    }

    #[test]
    fn builders_compose() {
        let config = GraphConfig::named("g")
            .with_bidirectional(BidirectionalPolicy::SharedRecord)
            .read_only();
        assert!(config.read_only);
        assert_eq!(config.bidirectional, BidirectionalPolicy::SharedRecord);
    }
}
