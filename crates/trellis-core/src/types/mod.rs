//! # Core Type Definitions
//!
//! This module contains all core types for the Trellis graph overlay:
//! - Identifiers (`RelationId`) and the key bound (`GraphKey`)
//! - Opaque payloads (`Payload`)
//! - Relation records (`Relation`)
//! - Error types (`GraphError`)
//!
//! ## Ordering Guarantees
//!
//! Identifiers and keys implement `Ord` so that every collection returned by
//! the overlay is a `BTreeMap`/`BTreeSet` with deterministic iteration order.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS & KEYS
// =============================================================================

/// Unique identifier for a relation.
///
/// Allocated once by the identity sequence, never reused. Ids are not dense:
/// an id consumed by a failed operation is skipped forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationId(pub u64);

impl RelationId {
    /// Get the raw id value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bound for node keys.
///
/// Keys are encoded with postcard when written to the substrate, so any
/// serde type with a total order can be used. `String` is the common case.
pub trait GraphKey:
    Serialize + DeserializeOwned + Ord + Clone + fmt::Debug + Send + Sync + 'static
{
}

impl<T> GraphKey for T where
    T: Serialize + DeserializeOwned + Ord + Clone + fmt::Debug + Send + Sync + 'static
{
}

// =============================================================================
// PAYLOAD
// =============================================================================

/// Opaque payload attached to nodes and relations.
///
/// The overlay never looks inside; typed (de)serialization belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Payload(pub Vec<u8>);

impl Payload {
    /// Create a payload from raw bytes.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the payload as UTF-8, if it is valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Lossy UTF-8 rendering for display purposes.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Consume the payload and return its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

// =============================================================================
// RELATION
// =============================================================================

/// A typed, directed relation between two nodes.
///
/// The relation store is the single source of truth for these records;
/// index entries only point at them by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation<K> {
    /// Globally unique relation id.
    pub id: RelationId,
    /// Source node key.
    pub from: K,
    /// Target node key.
    pub to: K,
    /// Relation type label.
    pub relation_type: String,
    /// Opaque relation payload.
    pub value: Payload,
    /// Whether this relation was created as part of a bidirectional edge.
    pub bidirectional: bool,
}

impl<K: GraphKey> Relation<K> {
    /// Create a new relation record.
    #[must_use]
    pub fn new(
        id: RelationId,
        from: K,
        to: K,
        relation_type: impl Into<String>,
        value: Payload,
        bidirectional: bool,
    ) -> Self {
        Self {
            id,
            from,
            to,
            relation_type: relation_type.into(),
            value,
            bidirectional,
        }
    }

    /// Check whether `key` is either endpoint of this relation.
    #[must_use]
    pub fn touches(&self, key: &K) -> bool {
        &self.from == key || &self.to == key
    }
}

impl<K: fmt::Display> fmt::Display for Relation<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}-- (ID:{} , Type:{} , BiDirectional:{}) --> {}",
            self.from,
            if self.bidirectional { " <" } else { " " },
            self.id,
            self.relation_type,
            self.bidirectional,
            self.to
        )
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Trellis overlay.
///
/// - "Already exists" is a `false` return, never an error
/// - "Not found" on reads is `Option::None`, never an error
/// - Substrate failures surface as `StorageUnavailable` and are never retried here
#[derive(Debug, Error)]
pub enum GraphError {
    /// The node does not exist (update/delete on an absent key).
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// A relation endpoint does not exist.
    #[error("Relation endpoint not found: {0}")]
    EndpointNotFound(String),

    /// The relation id is unknown.
    #[error("Relation not found: {0}")]
    RelationNotFound(RelationId),

    /// An index entry points at a relation that is missing or does not match.
    #[error("Index entry at {key} references stale relation {relation}")]
    IndexInconsistency {
        /// The stale relation id.
        relation: RelationId,
        /// Debug rendering of the primary key holding the entry.
        key: String,
    },

    /// The relation type is empty or exceeds `MAX_RELATION_TYPE_LENGTH`.
    #[error("Invalid relation type: {0:?}")]
    InvalidRelationType(String),

    /// Only the forward half of a two-record bidirectional relation was
    /// written. The forward record (this id) is persisted; `repair` adds
    /// the missing reverse record.
    #[error("Bidirectional relation {relation} is missing its reverse record: {reason}")]
    IncompleteBidirectional {
        /// The persisted forward relation.
        relation: RelationId,
        /// Why the reverse record was not written.
        reason: String,
    },

    /// A mutation was attempted on a read-only graph.
    #[error("Graph is read-only")]
    ReadOnly,

    /// A cascade delete finished with failed sub-steps.
    #[error("Cascade incomplete, failed steps: {}", .0.join("; "))]
    CascadeIncomplete(Vec<String>),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// The key-value substrate failed (I/O, timeout, poisoned lock).
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_display_marks_bidirectional() {
        let one_way = Relation::new(
            RelationId(1),
            "A".to_string(),
            "B".to_string(),
            "knows",
            Payload::from("v"),
            false,
        );
        assert_eq!(
            one_way.to_string(),
            "A -- (ID:1 , Type:knows , BiDirectional:false) --> B"
        );

        let both = Relation {
            bidirectional: true,
            ..one_way
        };
        assert_eq!(
            both.to_string(),
            "A <-- (ID:1 , Type:knows , BiDirectional:true) --> B"
        );
    }

    #[test]
    fn relation_touches_both_endpoints() {
        let rel = Relation::new(
            RelationId(7),
            "A".to_string(),
            "B".to_string(),
            "knows",
            Payload::default(),
            false,
        );
        assert!(rel.touches(&"A".to_string()));
        assert!(rel.touches(&"B".to_string()));
        assert!(!rel.touches(&"C".to_string()));
    }

    #[test]
    fn payload_utf8_views() {
        let text = Payload::from("yo");
        assert_eq!(text.as_str(), Some("yo"));

        let binary = Payload::new(vec![0xff, 0xfe]);
        assert!(binary.as_str().is_none());
        assert_eq!(binary.to_string_lossy().chars().count(), 2);
    }

    #[test]
    fn relation_ids_order_numerically() {
        let mut ids = vec![RelationId(10), RelationId(2), RelationId(7)];
        ids.sort();
        assert_eq!(ids, vec![RelationId(2), RelationId(7), RelationId(10)]);
    }

    #[test]
    fn cascade_error_lists_steps() {
        let err = GraphError::CascadeIncomplete(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Cascade incomplete, failed steps: a; b");
    }

    #[test]
    fn incomplete_bidirectional_names_forward_id() {
        let err = GraphError::IncompleteBidirectional {
            relation: RelationId(4),
            reason: "not leader".into(),
        };
        let text = err.to_string();
        assert!(text.contains('4'));
        assert!(text.ends_with("not leader"));
    }
}
