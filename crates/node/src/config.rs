use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use topology::TopologySpec;
use tracing::debug;
use types::errors::NodeError;

use crate::{session::SessionConfig, signature_cache::DEFAULT_SIGNATURE_CACHE_CAPACITY};

pub const CONFIG_PATH_ENV: &str = "COLLABFED_CONFIG";

const fn default_deadline_ms() -> u64 {
    5000
}

const fn default_finalize_margin_ms() -> u64 {
    100
}

const fn default_signature_cache_capacity() -> usize {
    DEFAULT_SIGNATURE_CACHE_CAPACITY
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationConfig {
    #[serde(default)]
    pub topology: TopologySpec,
    /// Defaults to every node of the topology.
    #[serde(default)]
    pub quorum: Option<usize>,
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    #[serde(default = "default_finalize_margin_ms")]
    pub finalize_margin_ms: u64,
    /// Derives every node key from this seed instead of the OS entropy
    /// source. Simulation only.
    #[serde(default)]
    pub key_seed: Option<String>,
    #[serde(default = "default_signature_cache_capacity")]
    pub signature_cache_capacity: usize,
    #[serde(default)]
    pub log_file_path: Option<PathBuf>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            topology: TopologySpec::default(),
            quorum: None,
            deadline_ms: default_deadline_ms(),
            finalize_margin_ms: default_finalize_margin_ms(),
            key_seed: None,
            signature_cache_capacity: default_signature_cache_capacity(),
            log_file_path: None,
        }
    }
}

impl FederationConfig {
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    #[must_use]
    pub const fn session_config(&self) -> SessionConfig {
        SessionConfig {
            finalize_margin: Duration::from_millis(self.finalize_margin_ms),
        }
    }

    /// The configured quorum, or `node_count` when none is set.
    #[must_use]
    pub fn quorum_for(&self, node_count: usize) -> usize {
        self.quorum.unwrap_or(node_count)
    }

    /// Reads YAML, or JSON when the file ends in `.json`.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            NodeError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;

        let config = if is_json(path) {
            serde_json::from_str::<Self>(&contents)
                .map_err(|e| NodeError::Config(format!("Failed to deserialize config file: {e}")))?
        } else {
            serde_yaml::from_str::<Self>(&contents)
                .map_err(|e| NodeError::Config(format!("Failed to deserialize config file: {e}")))?
        };
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), NodeError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                NodeError::Config(format!("Failed to create config directory: {e}"))
            })?;
        }

        let contents = if is_json(path) {
            serde_json::to_string_pretty(self)
                .map_err(|e| NodeError::Config(format!("Failed to serialize config: {e}")))?
        } else {
            serde_yaml::to_string(self)
                .map_err(|e| NodeError::Config(format!("Failed to serialize config: {e}")))?
        };

        fs::write(path, contents)
            .map_err(|e| NodeError::Config(format!("Failed to write config: {e}")))?;
        Ok(())
    }

    pub fn default_config_path() -> Result<PathBuf, NodeError> {
        let proj_dirs = ProjectDirs::from("", "", "CollabFed")
            .ok_or_else(|| NodeError::Config("Failed to determine project directory".into()))?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    /// Explicit path first, then `COLLABFED_CONFIG`, then the per-user
    /// default. A directory resolves to `config.yaml` inside it.
    pub fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf, NodeError> {
        let path = match explicit.or_else(|| dotenvy::var(CONFIG_PATH_ENV).ok().map(PathBuf::from)) {
            Some(mut path) => {
                if path.is_dir() {
                    path.push("config.yaml");
                }
                path
            }
            None => Self::default_config_path()?,
        };
        debug!("Using config file path: {}", path.display());
        Ok(path)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension == "json")
}
