//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::CliError;
use serde::Serialize;
use serde_json::{Value, json};
use std::path::Path;
use trellis_core::{
    ConsistencyReport, GraphConfig, GraphError, GraphService, IndexFault, Payload, RedbStore,
    Relation, RelationId,
};

/// The graph every command runs against.
pub type Graph = GraphService<RedbStore, String>;

/// Open the redb database and wrap it in a graph service.
///
/// A read-only graph requires an existing database and never writes to it.
/// Otherwise the database is created if needed.
pub fn open_graph(db_path: &Path, config: GraphConfig) -> Result<Graph, GraphError> {
    let store = if config.read_only {
        RedbStore::open_existing(db_path)?
    } else {
        RedbStore::open(db_path)?
    };
    tracing::debug!(database = %db_path.display(), graph = %config.name, "opened graph");
    Ok(GraphService::new(store, config))
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Convert any serializable report into a JSON value.
pub fn to_json<T: Serialize>(value: &T) -> Result<Value, CliError> {
    Ok(serde_json::to_value(value)?)
}

/// JSON view of a relation with the payload rendered as text.
pub fn relation_json(relation: &Relation<String>) -> Value {
    json!({
        "id": relation.id.value(),
        "from": relation.from,
        "to": relation.to,
        "type": relation.relation_type,
        "value": relation.value.to_string_lossy(),
        "bidirectional": relation.bidirectional,
    })
}

fn print_relations(json_mode: bool, relations: &[Relation<String>]) -> Result<(), CliError> {
    if json_mode {
        return print_json(&Value::Array(relations.iter().map(relation_json).collect()));
    }
    if relations.is_empty() {
        println!("(no relations)");
    }
    for relation in relations {
        println!("{relation}");
    }
    Ok(())
}

fn describe(fault: &IndexFault<String>) -> String {
    match fault {
        IndexFault::Adjacency { from, to, relation } => {
            format!("adjacency [{from}][{to}] -> {relation}")
        }
        IndexFault::Type {
            key,
            relation_type,
            relation,
        } => format!("type [{key}][{relation_type}] -> {relation}"),
    }
}

fn print_report(
    json_mode: bool,
    title: &str,
    report: &ConsistencyReport<String>,
) -> Result<(), CliError> {
    if json_mode {
        let mut output = to_json(report)?;
        if let Value::Object(map) = &mut output {
            map.insert("consistent".to_string(), json!(report.is_consistent()));
        }
        return print_json(&output);
    }

    println!("{title}");
    println!("{}", "=".repeat(title.len()));
    println!("Dangling entries: {}", report.dangling.len());
    for fault in &report.dangling {
        println!("  {}", describe(fault));
    }
    println!("Missing entries:  {}", report.missing.len());
    for fault in &report.missing {
        println!("  {}", describe(fault));
    }
    println!("Orphaned relations: {}", report.orphaned.len());
    for id in &report.orphaned {
        println!("  {id}");
    }
    println!("Unpaired relations: {}", report.unpaired.len());
    for id in &report.unpaired {
        println!("  {id}");
    }
    Ok(())
}

// =============================================================================
// NODE COMMANDS
// =============================================================================

/// Add a node.
pub fn cmd_add_node(graph: &Graph, json_mode: bool, key: &str, value: String) -> Result<(), CliError> {
    let created = graph.add_node(&key.to_owned(), value)?;

    if json_mode {
        print_json(&json!({ "key": key, "created": created }))?;
    } else if created {
        println!("Added node {key}");
    } else {
        println!("Node {key} already exists (unchanged)");
    }
    Ok(())
}

/// Show a node payload.
pub fn cmd_get_node(graph: &Graph, json_mode: bool, key: &str) -> Result<(), CliError> {
    let value = graph
        .get_node(&key.to_owned())?
        .ok_or_else(|| GraphError::NodeNotFound(key.to_string()))?;

    if json_mode {
        print_json(&json!({ "key": key, "value": value.to_string_lossy() }))?;
    } else {
        println!("{}", value.to_string_lossy());
    }
    Ok(())
}

/// Overwrite a node payload.
pub fn cmd_update_node(
    graph: &Graph,
    json_mode: bool,
    key: &str,
    value: String,
) -> Result<(), CliError> {
    graph.update_node(&key.to_owned(), Payload::from(value))?;

    if json_mode {
        print_json(&json!({ "key": key, "updated": true }))?;
    } else {
        println!("Updated node {key}");
    }
    Ok(())
}

/// Remove a node with its relations.
///
/// Prints the cascade report, then fails if any step failed.
pub fn cmd_remove_node(graph: &Graph, json_mode: bool, key: &str) -> Result<(), CliError> {
    let removal = graph.remove_node(&key.to_owned())?;

    if json_mode {
        print_json(&to_json(&removal)?)?;
    } else {
        println!(
            "Removed node {key} ({} relations)",
            removal.relations_removed.len()
        );
        for failure in &removal.failures {
            println!("  failed: {} ({})", failure.step, failure.error);
        }
    }

    removal.into_result()?;
    Ok(())
}

// =============================================================================
// RELATION COMMANDS
// =============================================================================

/// Add a relation.
pub fn cmd_add_relation(
    graph: &Graph,
    json_mode: bool,
    from: &str,
    to: &str,
    relation_type: &str,
    value: String,
    bidirectional: bool,
) -> Result<(), CliError> {
    let ids = graph.add_relation(
        &from.to_owned(),
        &to.to_owned(),
        relation_type,
        value,
        bidirectional,
    )?;

    if json_mode {
        let ids: Vec<u64> = ids.iter().map(|id| id.value()).collect();
        print_json(&json!({ "ids": ids }))?;
    } else {
        for id in ids {
            println!("Added relation {id}");
        }
    }
    Ok(())
}

/// Remove relations by endpoints and type.
pub fn cmd_remove_relation(
    graph: &Graph,
    json_mode: bool,
    from: &str,
    to: &str,
    relation_type: &str,
) -> Result<(), CliError> {
    let removed = graph.remove_relation(&from.to_owned(), &to.to_owned(), relation_type)?;

    if json_mode {
        print_json(&json!({ "removed": removed }))?;
    } else if removed {
        println!("Removed {relation_type} relations {from} -> {to}");
    } else {
        println!("No {relation_type} relation {from} -> {to}");
    }
    Ok(())
}

/// Remove a relation by id.
pub fn cmd_remove_relation_id(graph: &Graph, json_mode: bool, id: u64) -> Result<(), CliError> {
    let id = RelationId(id);
    if !graph.remove_relation_by_id(id)? {
        return Err(GraphError::RelationNotFound(id).into());
    }

    if json_mode {
        print_json(&json!({ "id": id.value(), "removed": true }))?;
    } else {
        println!("Removed relation {id}");
    }
    Ok(())
}

/// Show a relation by id.
pub fn cmd_relation(graph: &Graph, json_mode: bool, id: u64) -> Result<(), CliError> {
    let id = RelationId(id);
    let relation = graph
        .relation(id)?
        .ok_or(GraphError::RelationNotFound(id))?;

    if json_mode {
        print_json(&relation_json(&relation))?;
    } else {
        println!("{relation}");
        println!("value: {}", relation.value.to_string_lossy());
    }
    Ok(())
}

// =============================================================================
// QUERY COMMANDS
// =============================================================================

/// List outgoing relations.
pub fn cmd_outgoing(
    graph: &Graph,
    json_mode: bool,
    key: &str,
    relation_type: Option<&str>,
) -> Result<(), CliError> {
    let key = key.to_owned();
    let relations = match relation_type {
        Some(relation_type) => graph.outgoing_relations_of_type(&key, relation_type)?,
        None => graph.outgoing_relations(&key)?,
    };
    print_relations(json_mode, &relations)
}

/// List incoming relations.
pub fn cmd_incoming(
    graph: &Graph,
    json_mode: bool,
    key: &str,
    relation_type: Option<&str>,
) -> Result<(), CliError> {
    let key = key.to_owned();
    let relations = match relation_type {
        Some(relation_type) => graph.incoming_relations_of_type(&key, relation_type)?,
        None => graph.incoming_relations(&key)?,
    };
    print_relations(json_mode, &relations)
}

/// Show a node's out-degree.
pub fn cmd_degree(graph: &Graph, json_mode: bool, key: &str) -> Result<(), CliError> {
    let degree = graph.node_out_degree(&key.to_owned())?;

    if json_mode {
        print_json(&json!({ "key": key, "out_degree": degree }))?;
    } else {
        println!("{degree}");
    }
    Ok(())
}

/// Check whether two nodes are related.
pub fn cmd_related(graph: &Graph, json_mode: bool, from: &str, to: &str) -> Result<(), CliError> {
    let related = graph.are_related(&from.to_owned(), &to.to_owned())?;

    if json_mode {
        print_json(&json!({ "from": from, "to": to, "related": related }))?;
    } else {
        println!("{related}");
    }
    Ok(())
}

/// List relations between two nodes.
pub fn cmd_between(graph: &Graph, json_mode: bool, from: &str, to: &str) -> Result<(), CliError> {
    let relations = graph.relations_between(&from.to_owned(), &to.to_owned())?;
    print_relations(json_mode, &relations)
}

/// List relation types between two nodes.
pub fn cmd_types(graph: &Graph, json_mode: bool, from: &str, to: &str) -> Result<(), CliError> {
    let types = graph.relation_types(&from.to_owned(), &to.to_owned())?;

    if json_mode {
        print_json(&json!({ "from": from, "to": to, "types": types }))?;
    } else {
        for relation_type in types {
            println!("{relation_type}");
        }
    }
    Ok(())
}

// =============================================================================
// MAINTENANCE COMMANDS
// =============================================================================

/// Show graph counters.
pub fn cmd_stats(graph: &Graph, json_mode: bool, db_path: &Path) -> Result<(), CliError> {
    let stats = graph.stats()?;

    if json_mode {
        let mut output = to_json(&stats)?;
        if let Value::Object(map) = &mut output {
            map.insert("database".to_string(), json!(db_path.to_string_lossy()));
            map.insert("graph".to_string(), json!(graph.config().name));
        }
        return print_json(&output);
    }

    println!("Trellis Graph Stats");
    println!("===================");
    println!("Database: {:?}", db_path);
    println!("Graph:    {}", graph.config().name);
    println!();
    println!("Nodes:         {}", stats.node_count);
    println!("Relations:     {}", stats.relation_count);
    println!("Bidirectional: {}", stats.bidirectional_count);
    for (relation_type, count) in &stats.relation_types {
        println!("  {relation_type}: {count}");
    }
    Ok(())
}

/// Check index consistency.
pub fn cmd_check(graph: &Graph, json_mode: bool) -> Result<(), CliError> {
    let report = graph.check_consistency()?;
    print_report(json_mode, "Consistency Check", &report)
}

/// Repair index inconsistencies.
pub fn cmd_repair(graph: &Graph, json_mode: bool) -> Result<(), CliError> {
    let report = graph.repair()?;
    print_report(json_mode, "Repair", &report)
}
