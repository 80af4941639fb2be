//! # Trellis CLI Module
//!
//! This module implements the CLI interface for Trellis.
//!
//! ## Available Commands
//!
//! - `add-node`, `get-node`, `update-node`, `remove-node` - Node operations
//! - `add-relation`, `remove-relation`, `remove-relation-id`, `relation` - Relation operations
//! - `outgoing`, `incoming`, `degree`, `related`, `between`, `types` - Queries
//! - `stats` - Graph counters
//! - `check`, `repair` - Index consistency

mod commands;

use crate::config::{AppConfig, ConfigError};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;
use trellis_core::{GraphConfig, GraphError};

pub use commands::*;

// =============================================================================
// ERRORS
// =============================================================================

/// Anything that can stop a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Trellis - graph overlay on a key-value store
///
/// Nodes, typed relations and their adjacency/type indexes kept in a redb
/// database.
#[derive(Parser, Debug)]
#[command(name = "trellis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the graph database [default: trellis.db]
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Graph name (overrides the config file)
    #[arg(short = 'g', long, global = true)]
    pub graph: Option<String>,

    /// Open the graph read-only
    #[arg(long, global = true)]
    pub read_only: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a node (no-op if the key exists)
    AddNode {
        /// Node key
        key: String,

        /// Node payload
        #[arg(default_value = "")]
        value: String,
    },

    /// Show a node payload
    GetNode {
        /// Node key
        key: String,
    },

    /// Overwrite the payload of an existing node
    UpdateNode {
        /// Node key
        key: String,

        /// New payload
        value: String,
    },

    /// Remove a node and every relation touching it
    RemoveNode {
        /// Node key
        key: String,
    },

    /// Add a relation between two existing nodes
    AddRelation {
        /// Source node key
        from: String,

        /// Target node key
        to: String,

        /// Relation type
        #[arg(short = 't', long = "type")]
        relation_type: String,

        /// Relation payload
        #[arg(short, long, default_value = "")]
        value: String,

        /// Relate both directions
        #[arg(short, long)]
        bidirectional: bool,
    },

    /// Remove every relation of one type between two nodes
    RemoveRelation {
        /// Source node key
        from: String,

        /// Target node key
        to: String,

        /// Relation type
        #[arg(short = 't', long = "type")]
        relation_type: String,
    },

    /// Remove a relation by id
    RemoveRelationId {
        /// Relation id
        id: u64,
    },

    /// Show a relation by id
    Relation {
        /// Relation id
        id: u64,
    },

    /// List relations leaving a node
    Outgoing {
        /// Node key
        key: String,

        /// Only relations of this type
        #[arg(short = 't', long = "type")]
        relation_type: Option<String>,
    },

    /// List relations pointing at a node
    Incoming {
        /// Node key
        key: String,

        /// Only relations of this type
        #[arg(short = 't', long = "type")]
        relation_type: Option<String>,
    },

    /// Count relations leaving a node
    Degree {
        /// Node key
        key: String,
    },

    /// Check whether two nodes are related
    Related {
        /// Source node key
        from: String,

        /// Target node key
        to: String,
    },

    /// List relations between two nodes
    Between {
        /// Source node key
        from: String,

        /// Target node key
        to: String,
    },

    /// List relation types between two nodes
    Types {
        /// Source node key
        from: String,

        /// Target node key
        to: String,
    },

    /// Show graph counters
    Stats,

    /// Check index consistency
    Check,

    /// Repair index inconsistencies
    Repair,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

impl Cli {
    /// Resolve the graph configuration: file values, then flags.
    pub fn graph_config(&self, file: &AppConfig) -> GraphConfig {
        let mut config = file.graph.clone();
        if let Some(name) = &self.graph {
            config.name.clone_from(name);
        }
        if self.read_only {
            config.read_only = true;
        }
        config
    }
}

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), CliError> {
    let file = AppConfig::load(cli.config.as_deref())?;
    let db_path = file.database_path(cli.database.as_deref());
    let graph = open_graph(&db_path, cli.graph_config(&file))?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::AddNode { key, value }) => cmd_add_node(&graph, json_mode, &key, value),
        Some(Commands::GetNode { key }) => cmd_get_node(&graph, json_mode, &key),
        Some(Commands::UpdateNode { key, value }) => {
            cmd_update_node(&graph, json_mode, &key, value)
        }
        Some(Commands::RemoveNode { key }) => cmd_remove_node(&graph, json_mode, &key),
        Some(Commands::AddRelation {
            from,
            to,
            relation_type,
            value,
            bidirectional,
        }) => cmd_add_relation(
            &graph,
            json_mode,
            &from,
            &to,
            &relation_type,
            value,
            bidirectional,
        ),
        Some(Commands::RemoveRelation {
            from,
            to,
            relation_type,
        }) => cmd_remove_relation(&graph, json_mode, &from, &to, &relation_type),
        Some(Commands::RemoveRelationId { id }) => cmd_remove_relation_id(&graph, json_mode, id),
        Some(Commands::Relation { id }) => cmd_relation(&graph, json_mode, id),
        Some(Commands::Outgoing { key, relation_type }) => {
            cmd_outgoing(&graph, json_mode, &key, relation_type.as_deref())
        }
        Some(Commands::Incoming { key, relation_type }) => {
            cmd_incoming(&graph, json_mode, &key, relation_type.as_deref())
        }
        Some(Commands::Degree { key }) => cmd_degree(&graph, json_mode, &key),
        Some(Commands::Related { from, to }) => cmd_related(&graph, json_mode, &from, &to),
        Some(Commands::Between { from, to }) => cmd_between(&graph, json_mode, &from, &to),
        Some(Commands::Types { from, to }) => cmd_types(&graph, json_mode, &from, &to),
        Some(Commands::Check) => cmd_check(&graph, json_mode),
        Some(Commands::Repair) => cmd_repair(&graph, json_mode),
        // No subcommand - show stats by default
        Some(Commands::Stats) | None => cmd_stats(&graph, json_mode, &db_path),
    }
}
