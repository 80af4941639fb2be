//! # trellis-core
//!
//! A graph overlay on a linearizable key-value store.
//!
//! Nodes are keyed payloads. Relations are directed, typed, optionally
//! bidirectional edges with their own payload and a globally unique id.
//! Two derived indexes answer neighborhood queries without scanning the
//! relation table:
//! - adjacency: `from -> to -> {relation ids}`
//! - type: `from -> relation type -> {relation ids}`
//!
//! ## Architectural Constraints
//!
//! - The service keeps no state of its own; every fact lives in the substrate
//!   behind the `KvStore` trait
//! - Each substrate primitive is linearizable; multi-step operations are not
//!   atomic, so readers tolerate index ids with no record behind them
//! - Index membership changes only through atomic set primitives
//! - No async, no network dependencies

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod consistency;
pub mod graph;
pub mod index;
pub mod nodes;
pub mod primitives;
pub mod relations;
pub mod sequence;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{GraphError, GraphKey, Payload, Relation, RelationId};

// =============================================================================
// RE-EXPORTS: Graph Service
// =============================================================================

pub use config::{BidirectionalPolicy, GraphConfig};
pub use consistency::{ConsistencyReport, IndexFault};
pub use graph::{
    CascadeFailure, CascadeStep, GraphService, GraphStats, NodeRemoval, validate_relation_type,
};

// =============================================================================
// RE-EXPORTS: Components
// =============================================================================

pub use index::{AdjacencyIndex, RelationIndex, TypeIndex};
pub use nodes::NodeStore;
pub use relations::RelationStore;
pub use sequence::IdentitySequence;
pub use storage::{KvStore, MemoryStore, RedbStore};
