//! Configuration data structures for maprelay.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files. Every field
//! has a default so a minimal file only needs to list its services.
use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_index_file() -> String {
    "index.html".to_string()
}

/// Application-wide configuration.
///
/// Loaded once at startup and held behind an `ArcSwap` so the development
/// reload can replace it; readers always see a complete snapshot.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// Socket address the HTTP transport binds to.
    pub listen_addr: String,
    /// When set, handler failures propagate to the transport's diagnostic
    /// page instead of being turned into a generic 500.
    pub debug_mode: bool,
    /// Default logging configuration file, used when none is given on the
    /// command line.
    pub log_conf: Option<PathBuf>,
    /// Base directory relative paths are resolved against. Filled in from the
    /// configuration file location by the loader when left empty.
    pub conf_base_dir: Option<PathBuf>,
    /// Services keyed by an arbitrary identifier. The map is ordered so that
    /// registration order, and therefore collision resolution, is stable.
    pub services: BTreeMap<String, ServiceConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            debug_mode: false,
            log_conf: None,
            conf_base_dir: None,
            services: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// All route names in registration order, duplicates included.
    pub fn declared_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.services.iter().flat_map(|(key, service)| {
            service
                .names()
                .iter()
                .map(move |name| (key.as_str(), name.as_str()))
        })
    }
}

/// Configuration of one built-in service variant.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceConfig {
    /// JSON status document describing the running dispatcher.
    Status { names: Vec<String> },
    /// Files served from a directory below `/<name>/`.
    Static {
        names: Vec<String>,
        root: PathBuf,
        #[serde(default = "default_index_file")]
        index_file: String,
    },
}

impl ServiceConfig {
    pub fn names(&self) -> &[String] {
        match self {
            ServiceConfig::Status { names } => names,
            ServiceConfig::Static { names, .. } => names,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServiceConfig::Status { .. } => "status",
            ServiceConfig::Static { .. } => "static",
        }
    }
}
