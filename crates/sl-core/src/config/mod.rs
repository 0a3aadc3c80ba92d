//! Configuration management for Sandloop

mod node;
mod tuning;

pub use node::NodeConnectionConfig;
pub use tuning::{LoopTuning, GOLDEN_RATIO, TETRAHEDRAL_NODES};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sandloop")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Full configuration for a sandloop run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandloopConfig {
    /// Configured nodes, in registration order
    #[serde(default)]
    pub nodes: Vec<NodeConnectionConfig>,

    /// Timing and weighting knobs
    #[serde(default)]
    pub tuning: LoopTuning,
}

impl SandloopConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, content)
            .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Build the four-node demo fleet from environment variables.
    ///
    /// Each node `N` (1..=4) reads `SANDLOOP_NODE_<N>_HOST`, `_USER`, and
    /// `_KEY`, independently overridable, defaulting to localhost with the
    /// caller's `~/.ssh/id_rsa`. API ports are 8080 through 8083 so the
    /// fleet can share one host.
    pub fn demo_fleet() -> Self {
        let default_key = dirs::home_dir().map(|home| home.join(".ssh").join("id_rsa"));

        let nodes = (1..=TETRAHEDRAL_NODES as u16)
            .map(|n| {
                let mut config = NodeConnectionConfig::new(
                    env_or(&format!("SANDLOOP_NODE_{}_HOST", n), "localhost"),
                );
                config.username = env_or(&format!("SANDLOOP_NODE_{}_USER", n), "ubuntu");
                config.key_file = std::env::var(format!("SANDLOOP_NODE_{}_KEY", n))
                    .ok()
                    .map(PathBuf::from)
                    .or_else(|| default_key.clone());
                config.api_port = 8079 + n;
                config
            })
            .collect();

        Self {
            nodes,
            tuning: LoopTuning::default(),
        }
    }

    /// Validate that the configuration can drive a run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::NoNodes);
        }
        for node in &self.nodes {
            if node.host.is_empty() {
                return Err(ConfigError::Invalid("node host must not be empty".into()));
            }
        }
        Ok(())
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_fleet_has_four_nodes_with_distinct_ports() {
        let config = SandloopConfig::demo_fleet();
        assert_eq!(config.nodes.len(), 4);
        let ports: Vec<u16> = config.nodes.iter().map(|n| n.api_port).collect();
        assert_eq!(ports, vec![8080, 8081, 8082, 8083]);
    }

    #[test]
    fn test_validate_rejects_empty_fleet() {
        let config = SandloopConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::NoNodes)));
    }

    #[test]
    fn test_load_missing_file() {
        let path = Path::new("/nonexistent/sandloop.toml");
        assert!(matches!(
            SandloopConfig::load(path),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = SandloopConfig::demo_fleet();
        config.nodes.truncate(2);
        config.save(&path).unwrap();

        let loaded = SandloopConfig::load(&path).unwrap();
        assert_eq!(loaded.nodes.len(), 2);
        assert_eq!(loaded.nodes[0].api_port, 8080);
    }
}
