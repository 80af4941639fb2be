//! # Property-Based Tests
//!
//! Random operation sequences against the graph service. After every
//! sequence the indexes must agree with the relation table and the
//! cascade/idempotence rules must hold.

use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeSet;
use trellis_core::{
    BidirectionalPolicy, GraphConfig, GraphError, GraphService, MemoryStore, Payload, RelationId,
};

const KEYS: [&str; 6] = ["a", "b", "c", "d", "e", "f"];
const TYPES: [&str; 3] = ["knows", "likes", "owns"];

#[derive(Debug, Clone)]
enum Op {
    AddNode(usize, u8),
    RemoveNode(usize),
    AddRelation(usize, usize, usize, bool),
    RemoveRelation(usize, usize, usize),
    RemoveRelationById(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..KEYS.len(), any::<u8>()).prop_map(|(k, v)| Op::AddNode(k, v)),
        1 => (0..KEYS.len()).prop_map(Op::RemoveNode),
        4 => (0..KEYS.len(), 0..KEYS.len(), 0..TYPES.len(), any::<bool>())
            .prop_map(|(f, t, ty, bi)| Op::AddRelation(f, t, ty, bi)),
        1 => (0..KEYS.len(), 0..KEYS.len(), 0..TYPES.len())
            .prop_map(|(f, t, ty)| Op::RemoveRelation(f, t, ty)),
        1 => (1u64..40).prop_map(Op::RemoveRelationById),
    ]
}

fn policy() -> impl Strategy<Value = BidirectionalPolicy> {
    prop_oneof![
        Just(BidirectionalPolicy::SeparateRecords),
        Just(BidirectionalPolicy::SharedRecord),
    ]
}

fn key(i: usize) -> String {
    KEYS[i].to_string()
}

fn apply(graph: &GraphService<MemoryStore>, op: &Op) -> Result<(), GraphError> {
    match op {
        Op::AddNode(k, v) => {
            graph.add_node(&key(*k), vec![*v])?;
        }
        Op::RemoveNode(k) => {
            if graph.get_node(&key(*k))?.is_some() {
                graph.remove_node(&key(*k))?.into_result()?;
            }
        }
        Op::AddRelation(f, t, ty, bi) => {
            match graph.add_relation(&key(*f), &key(*t), TYPES[*ty], "v", *bi) {
                Ok(_) | Err(GraphError::EndpointNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Op::RemoveRelation(f, t, ty) => {
            graph.remove_relation(&key(*f), &key(*t), TYPES[*ty])?;
        }
        Op::RemoveRelationById(id) => {
            graph.remove_relation_by_id(RelationId(*id))?;
        }
    }
    Ok(())
}

proptest! {
    /// Any operation sequence leaves the indexes in agreement with the relation table.
    #[test]
    fn indexes_match_relation_table(ops in vec(op(), 1..60), policy in policy()) {
        let graph: GraphService<MemoryStore> = GraphService::new(
            MemoryStore::new(),
            GraphConfig::default().with_bidirectional(policy),
        );
        for op in &ops {
            apply(&graph, op).expect("apply");
        }

        let report = graph.check_consistency().expect("check");
        prop_assert!(report.is_consistent(), "{:?}", report);
    }

    /// Removed nodes leave no relation or index entry behind.
    #[test]
    fn removed_nodes_are_gone(ops in vec(op(), 1..60), victim in 0..KEYS.len()) {
        let graph: GraphService<MemoryStore> =
            GraphService::new(MemoryStore::new(), GraphConfig::default());
        for op in &ops {
            apply(&graph, op).expect("apply");
        }
        apply(&graph, &Op::RemoveNode(victim)).expect("remove");

        let gone = key(victim);
        prop_assert!(graph.relations().scan_by_endpoint(&gone).expect("scan").is_empty());
        prop_assert!(graph.adjacency().lookup(&gone).expect("lookup").is_empty());
        prop_assert!(graph.types().lookup(&gone).expect("lookup").is_empty());
        prop_assert!(graph.incoming_relations(&gone).expect("incoming").is_empty());
    }

    /// The first payload written for a key wins.
    #[test]
    fn first_add_wins(first in any::<u8>(), second in any::<u8>()) {
        let graph: GraphService<MemoryStore> =
            GraphService::new(MemoryStore::new(), GraphConfig::default());
        prop_assert!(graph.add_node(&key(0), vec![first]).expect("add"));
        prop_assert!(!graph.add_node(&key(0), vec![second]).expect("add"));
        prop_assert_eq!(graph.get_node(&key(0)).expect("get"), Some(Payload(vec![first])));
    }

    /// Successful relation inserts return strictly increasing ids.
    #[test]
    fn ids_strictly_increase(ops in vec(op(), 1..60)) {
        let graph: GraphService<MemoryStore> =
            GraphService::new(MemoryStore::new(), GraphConfig::default());
        let mut last = RelationId(0);
        for op in &ops {
            if let Op::AddRelation(f, t, ty, bi) = op {
                if let Ok(ids) = graph.add_relation(&key(*f), &key(*t), TYPES[*ty], "v", *bi) {
                    for id in ids {
                        prop_assert!(id > last);
                        last = id;
                    }
                }
            } else {
                apply(&graph, op).expect("apply");
            }
        }
    }

    /// Outgoing queries return each live relation of a node exactly once.
    #[test]
    fn outgoing_relations_are_unique(ops in vec(op(), 1..60), probe in 0..KEYS.len()) {
        let graph: GraphService<MemoryStore> =
            GraphService::new(MemoryStore::new(), GraphConfig::default());
        for op in &ops {
            apply(&graph, op).expect("apply");
        }

        let outgoing = graph.outgoing_relations(&key(probe)).expect("outgoing");
        let ids: BTreeSet<RelationId> = outgoing.iter().map(|r| r.id).collect();
        prop_assert_eq!(ids.len(), outgoing.len());
        prop_assert!(outgoing.iter().all(|r| r.from == key(probe)));
        prop_assert_eq!(graph.node_out_degree(&key(probe)).expect("degree"), outgoing.len());
    }
}
