//! # Primitives
//!
//! Fixed constants for the Trellis overlay: keyspace naming and input limits.
//!
//! Keyspaces are derived from the graph name so several graphs can share one
//! substrate without colliding.

/// Default graph name used for keyspace prefixes.
pub const DEFAULT_GRAPH_NAME: &str = "graph";

/// Default name of the substrate counter backing relation ids.
pub const DEFAULT_ID_SEQUENCE: &str = "relations_id_generator";

/// Keyspace suffix for the node table.
pub const NODES_SUFFIX: &str = "_nodes";

/// Keyspace suffix for the relation table.
pub const RELATIONS_SUFFIX: &str = "_relations";

/// Keyspace suffix for the from -> to adjacency index.
pub const ADJACENCY_SUFFIX: &str = "_from2to";

/// Keyspace suffix for the from -> type index.
pub const TYPES_SUFFIX: &str = "_from2type";

/// Maximum length for relation type strings, in bytes.
pub const MAX_RELATION_TYPE_LENGTH: usize = 256;

/// Build a keyspace name from a graph name and a suffix.
#[must_use]
pub fn keyspace(graph: &str, suffix: &str) -> String {
    let mut name = String::with_capacity(graph.len() + suffix.len());
    name.push_str(graph);
    name.push_str(suffix);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyspace_appends_suffix() {
        assert_eq!(keyspace("social", NODES_SUFFIX), "social_nodes");
        assert_eq!(keyspace("social", ADJACENCY_SUFFIX), "social_from2to");
    }

    #[test]
    fn suffixes_are_distinct() {
        let suffixes = [NODES_SUFFIX, RELATIONS_SUFFIX, ADJACENCY_SUFFIX, TYPES_SUFFIX];
        for (i, a) in suffixes.iter().enumerate() {
            for b in &suffixes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
