//! # CLI Configuration
//!
//! Optional TOML file with a database path and a `[graph]` table that maps
//! onto `GraphConfig`. Command-line flags override file values.
//!
//! ```toml
//! database = "social.db"
//!
//! [graph]
//! name = "social"
//! bidirectional = "shared_record"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use trellis_core::GraphConfig;

/// Default database path when neither flag nor file sets one.
pub const DEFAULT_DATABASE: &str = "trellis.db";

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// File-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database path.
    pub database: Option<PathBuf>,
    /// Graph settings.
    pub graph: GraphConfig,
}

impl AppConfig {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => read_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a TOML document.
    pub fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Database path: flag, then file, then `DEFAULT_DATABASE`.
    pub fn database_path(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.database.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE))
    }
}

fn read_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    AppConfig::parse(&contents, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::BidirectionalPolicy;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::parse("", Path::new("t.toml")).expect("parse");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.database_path(None), PathBuf::from(DEFAULT_DATABASE));
    }

    #[test]
    fn graph_table_is_partial() {
        let config = AppConfig::parse(
            "database = \"x.db\"\n[graph]\nname = \"social\"\nbidirectional = \"shared_record\"\n",
            Path::new("t.toml"),
        )
        .expect("parse");
        assert_eq!(config.graph.name, "social");
        assert_eq!(config.graph.bidirectional, BidirectionalPolicy::SharedRecord);
        assert!(!config.graph.read_only);
        assert_eq!(config.graph.id_sequence, "relations_id_generator");
        assert_eq!(config.database_path(None), PathBuf::from("x.db"));
        assert_eq!(
            config.database_path(Some(Path::new("flag.db"))),
            PathBuf::from("flag.db")
        );
    }

    #[test]
    fn bad_policy_is_a_parse_error() {
        let result = AppConfig::parse("[graph]\nbidirectional = \"both\"\n", Path::new("t.toml"));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/trellis.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
