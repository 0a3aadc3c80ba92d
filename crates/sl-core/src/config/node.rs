//! Per-node connection configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::NodeId;

fn default_ssh_port() -> u16 {
    22
}

fn default_username() -> String {
    // default for most cloud images
    "ubuntu".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_install_path() -> String {
    "/opt/ho-core/target/release/ho-core".to_string()
}

fn default_workdir() -> String {
    "/opt/ho-core".to_string()
}

/// Connection configuration for a remote node
///
/// Immutable once registered; runtime state lives in `NodeStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConnectionConfig {
    /// Hostname or address reachable over SSH
    pub host: String,

    /// SSH port
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// SSH username
    #[serde(default = "default_username")]
    pub username: String,

    /// Path to a private key for authentication
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Password authentication, used when no key is configured
    #[serde(default)]
    pub password: Option<String>,

    /// Port of the node's control API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Path of the service binary on the node
    #[serde(default = "default_install_path")]
    pub install_path: String,

    /// Working directory for dialogue runs and result artifacts
    #[serde(default = "default_workdir")]
    pub workdir: String,
}

impl NodeConnectionConfig {
    /// Create a config for a host with defaults for everything else
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_ssh_port(),
            username: default_username(),
            key_file: None,
            password: None,
            api_port: default_api_port(),
            install_path: default_install_path(),
            workdir: default_workdir(),
        }
    }

    /// Stable node ID derived from host and control-API port
    pub fn node_id(&self) -> NodeId {
        NodeId::from_endpoint(&self.host, self.api_port)
    }

    /// Base URL of the node's control API
    pub fn api_url(&self) -> String {
        format!("http://{}:{}", self.host, self.api_port)
    }

    /// Peer port the service binds alongside its API port
    pub fn p2p_port(&self) -> u16 {
        self.api_port + 1000
    }

    /// File name of the service binary
    pub fn binary_name(&self) -> &str {
        self.install_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.install_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_is_host_and_api_port() {
        let mut config = NodeConnectionConfig::new("node-a.internal");
        config.api_port = 8082;
        assert_eq!(config.node_id().as_str(), "node-a.internal:8082");
    }

    #[test]
    fn test_api_url() {
        let config = NodeConnectionConfig::new("10.1.2.3");
        assert_eq!(config.api_url(), "http://10.1.2.3:8080");
    }

    #[test]
    fn test_p2p_port_offset() {
        let mut config = NodeConnectionConfig::new("x");
        config.api_port = 8081;
        assert_eq!(config.p2p_port(), 9081);
    }

    #[test]
    fn test_binary_name() {
        let config = NodeConnectionConfig::new("x");
        assert_eq!(config.binary_name(), "ho-core");
    }

    #[test]
    fn test_defaults_from_minimal_toml() {
        let config: NodeConnectionConfig = toml::from_str("host = \"n1\"").unwrap();
        assert_eq!(config.port, 22);
        assert_eq!(config.username, "ubuntu");
        assert_eq!(config.api_port, 8080);
        assert!(config.key_file.is_none());
    }
}
